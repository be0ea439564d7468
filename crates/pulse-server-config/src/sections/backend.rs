// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend session store the gateway forwards to.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "http://localhost:8081";
const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
	pub base_url: String,
	pub forward_timeout_secs: u64,
}

impl BackendConfig {
	pub fn forward_timeout(&self) -> Duration {
		Duration::from_secs(self.forward_timeout_secs)
	}
}

impl Default for BackendConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			forward_timeout_secs: DEFAULT_FORWARD_TIMEOUT_SECS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BackendConfigLayer {
	#[serde(default)]
	pub base_url: Option<String>,
	#[serde(default)]
	pub forward_timeout_secs: Option<u64>,
}

impl BackendConfigLayer {
	pub fn merge(&mut self, other: BackendConfigLayer) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.forward_timeout_secs.is_some() {
			self.forward_timeout_secs = other.forward_timeout_secs;
		}
	}

	pub fn finalize(self) -> BackendConfig {
		BackendConfig {
			base_url: self
				.base_url
				.map(|url| url.trim_end_matches('/').to_string())
				.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
			forward_timeout_secs: self
				.forward_timeout_secs
				.unwrap_or(DEFAULT_FORWARD_TIMEOUT_SECS),
		}
	}
}
