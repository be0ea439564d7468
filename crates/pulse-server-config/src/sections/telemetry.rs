// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ingestion behaviour of the telemetry gateway.

use pulse_telemetry_core::{MissingProjectPolicy, ProjectId};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
	/// Environment recorded on errors that arrive without one.
	pub environment: String,
	/// Project assumed for header-less requests under the passthrough policy.
	pub default_project_id: Option<ProjectId>,
	pub missing_project_policy: MissingProjectPolicy,
}

impl Default for TelemetryConfig {
	fn default() -> Self {
		Self {
			environment: "production".to_string(),
			default_project_id: None,
			missing_project_policy: MissingProjectPolicy::Reject,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TelemetryConfigLayer {
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub default_project_id: Option<String>,
	#[serde(default)]
	pub missing_project_policy: Option<MissingProjectPolicy>,
}

impl TelemetryConfigLayer {
	pub fn merge(&mut self, other: TelemetryConfigLayer) {
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.default_project_id.is_some() {
			self.default_project_id = other.default_project_id;
		}
		if other.missing_project_policy.is_some() {
			self.missing_project_policy = other.missing_project_policy;
		}
	}

	pub fn finalize(self) -> Result<TelemetryConfig, ConfigError> {
		let default_project_id = match self.default_project_id.as_deref().map(str::trim) {
			None | Some("") => None,
			Some(value) => Some(ProjectId::parse(value).map_err(|e| ConfigError::InvalidValue {
				key: "telemetry.default_project_id".to_string(),
				message: e.to_string(),
			})?),
		};

		Ok(TelemetryConfig {
			environment: self
				.environment
				.filter(|e| !e.trim().is_empty())
				.unwrap_or_else(|| "production".to_string()),
			default_project_id,
			missing_project_policy: self.missing_project_policy.unwrap_or_default(),
		})
	}
}
