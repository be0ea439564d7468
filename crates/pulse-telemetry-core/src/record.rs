// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry records produced by the client SDK.
//!
//! Records are built once at capture time and moved into the reporter. Nothing
//! mutates them afterwards; any later lifecycle (for example resolving an
//! error) happens in the backend store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryCoreError;
use crate::ids::SessionId;
use crate::value::EventData;

/// How an error reached the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
	/// Raised by a global hook (panic hook, failed background task).
	Uncaught,
	/// Reported explicitly by application code or an error boundary.
	Manual,
}

impl fmt::Display for ErrorSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ErrorSource::Uncaught => write!(f, "uncaught"),
			ErrorSource::Manual => write!(f, "manual"),
		}
	}
}

impl FromStr for ErrorSource {
	type Err = TelemetryCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"uncaught" => Ok(ErrorSource::Uncaught),
			"manual" => Ok(ErrorSource::Manual),
			_ => Err(TelemetryCoreError::InvalidErrorSource(s.to_string())),
		}
	}
}

/// Description of the runtime that produced a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserInfo {
	pub user_agent: String,
	pub platform: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
}

impl BrowserInfo {
	/// Describes the current process: the given user agent plus `os-arch`.
	#[must_use]
	pub fn for_current_process(user_agent: impl Into<String>) -> Self {
		Self {
			user_agent: user_agent.into(),
			platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
			language: std::env::var("LANG").ok().filter(|l| !l.is_empty()),
		}
	}
}

/// A captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
	pub message: String,
	pub stack_trace: String,
	pub source: ErrorSource,
	#[serde(rename = "type")]
	pub error_type: String,
	pub url: String,
	pub environment: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub component_stack: Option<String>,
	pub browser_info: BrowserInfo,
	pub user_id: String,
	pub session_id: SessionId,
	pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
	/// Signature used for client-side duplicate suppression.
	#[must_use]
	pub fn signature(&self) -> String {
		format!("{}:{}", self.error_type, self.message)
	}
}

/// A named application event with arbitrary data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
	pub event_name: String,
	pub event_data: EventData,
	pub user_id: String,
	pub session_id: SessionId,
	pub url: String,
	pub timestamp: DateTime<Utc>,
}

/// A single page view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
	pub page: String,
	pub referrer: String,
	pub user_agent: String,
	pub user_id: String,
	pub session_id: SessionId,
	pub timestamp: DateTime<Utc>,
}
