// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types for telemetry session tracking.

use chrono::{DateTime, Utc};
use pulse_telemetry_core::{ProjectId, SessionId, ANONYMOUS_USER};
use serde::{Deserialize, Serialize};

use crate::error::SessionsError;

/// A bounded period of user activity on one device.
///
/// Rows are keyed by `(project_id, session_id)` in the backend store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	pub session_id: SessionId,
	pub project_id: ProjectId,
	pub user_id: String,
	pub start_time: DateTime<Utc>,
	pub end_time: Option<DateTime<Utc>>,
	pub error_count: u32,
	pub event_count: u32,
	pub pageview_count: u32,
}

impl Session {
	#[must_use]
	pub fn is_ended(&self) -> bool {
		self.end_time.is_some()
	}

	/// Duration in milliseconds, for ended sessions.
	#[must_use]
	pub fn duration_ms(&self) -> Option<i64> {
		self.end_time
			.map(|end| (end - self.start_time).num_milliseconds().max(0))
	}

	#[must_use]
	pub fn count_for(&self, kind: SignalKind) -> u32 {
		match kind {
			SignalKind::Error => self.error_count,
			SignalKind::Event => self.event_count,
			SignalKind::PageView => self.pageview_count,
		}
	}
}

/// Kind of signal counted against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
	#[serde(rename = "error")]
	Error,
	#[serde(rename = "event")]
	Event,
	#[serde(rename = "pageview")]
	PageView,
}

impl SignalKind {
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			SignalKind::Error => "error",
			SignalKind::Event => "event",
			SignalKind::PageView => "pageview",
		}
	}
}

impl std::fmt::Display for SignalKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for SignalKind {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"error" => Ok(SignalKind::Error),
			"event" => Ok(SignalKind::Event),
			"pageview" => Ok(SignalKind::PageView),
			_ => Err(SessionsError::InvalidSignalKind(s.to_string())),
		}
	}
}

/// Payload of a session start call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
	pub session_id: SessionId,
	pub project_id: ProjectId,
	pub user_id: String,
	pub timestamp: DateTime<Utc>,
}

impl StartSession {
	/// Builds a start payload stamped now, defaulting the user to anonymous.
	#[must_use]
	pub fn new(session_id: SessionId, project_id: ProjectId, user_id: Option<&str>) -> Self {
		Self {
			session_id,
			project_id,
			user_id: normalize_user(user_id),
			timestamp: Utc::now(),
		}
	}

	#[must_use]
	pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = timestamp;
		self
	}
}

/// Payload of a session end call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSession {
	pub session_id: SessionId,
	pub project_id: ProjectId,
	pub timestamp: DateTime<Utc>,
}

impl EndSession {
	#[must_use]
	pub fn new(session_id: SessionId, project_id: ProjectId) -> Self {
		Self {
			session_id,
			project_id,
			timestamp: Utc::now(),
		}
	}
}

/// Payload recording one signal against a session's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
	pub session_id: SessionId,
	pub project_id: ProjectId,
	pub user_id: String,
	pub kind: SignalKind,
	pub timestamp: DateTime<Utc>,
}

/// Maps an absent or blank user id to [`ANONYMOUS_USER`].
#[must_use]
pub fn normalize_user(user_id: Option<&str>) -> String {
	user_id
		.map(str::trim)
		.filter(|u| !u.is_empty())
		.unwrap_or(ANONYMOUS_USER)
		.to_string()
}
