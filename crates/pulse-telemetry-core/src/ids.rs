// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier types shared across the telemetry system.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TelemetryCoreError};

/// User identifier recorded when the host application has not identified the user.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Project recorded for requests the gateway passes through without a project.
pub const UNSCOPED_PROJECT: &str = "unscoped";

const SESSION_PREFIX: &str = "session";
const SESSION_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Project identity scoping every session, error and event record.
///
/// A `ProjectId` is never blank. Requests the gateway passes through without
/// a project header share the [`ProjectId::unscoped`] identity, which parses
/// like any other id so it travels over headers and bodies unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
	/// Parses a project id, trimming surrounding whitespace.
	pub fn parse(value: &str) -> Result<Self> {
		let trimmed = value.trim();
		if trimmed.is_empty() {
			return Err(TelemetryCoreError::MissingProjectId);
		}
		Ok(Self(trimmed.to_string()))
	}

	/// The identity given to requests that arrive without a project.
	#[must_use]
	pub fn unscoped() -> Self {
		Self(UNSCOPED_PROJECT.to_string())
	}

	#[must_use]
	pub fn is_unscoped(&self) -> bool {
		self.0 == UNSCOPED_PROJECT
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ProjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for ProjectId {
	type Err = TelemetryCoreError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// What the gateway does with a request that carries no project id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingProjectPolicy {
	/// Reject the request with a client error.
	#[default]
	Reject,
	/// Accept the request under the default project, or unscoped if none.
	Passthrough,
}

impl MissingProjectPolicy {
	/// Resolves the project for a request from its (possibly absent) header.
	pub fn resolve(self, header: Option<&str>, default: Option<&ProjectId>) -> Result<ProjectId> {
		match header.map(ProjectId::parse) {
			Some(Ok(project_id)) => Ok(project_id),
			Some(Err(_)) | None => match self {
				Self::Reject => Err(TelemetryCoreError::MissingProjectId),
				Self::Passthrough => Ok(default.cloned().unwrap_or_else(ProjectId::unscoped)),
			},
		}
	}

	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Reject => "reject",
			Self::Passthrough => "passthrough",
		}
	}
}

impl fmt::Display for MissingProjectPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MissingProjectPolicy {
	type Err = TelemetryCoreError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"reject" => Ok(Self::Reject),
			"passthrough" => Ok(Self::Passthrough),
			other => Err(TelemetryCoreError::InvalidPolicy(other.to_string())),
		}
	}
}

/// Client-generated session identifier.
///
/// Generated ids look like `session_1718031234567_k3j9x0a`: the creation time
/// in unix milliseconds followed by seven lowercase base36 characters. Ids
/// received over the wire are accepted in any non-blank form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	#[must_use]
	pub fn generate() -> Self {
		let suffix: String = (0..SESSION_SUFFIX_LEN)
			.map(|_| BASE36[fastrand::usize(..BASE36.len())] as char)
			.collect();
		Self(format!(
			"{SESSION_PREFIX}_{}_{suffix}",
			Utc::now().timestamp_millis()
		))
	}

	pub fn parse(value: &str) -> Result<Self> {
		let trimmed = value.trim();
		if trimmed.is_empty() {
			return Err(TelemetryCoreError::InvalidSessionId(value.to_string()));
		}
		Ok(Self(trimmed.to_string()))
	}

	/// Parses an optional wire value, treating blank as absent.
	#[must_use]
	pub fn from_optional(value: Option<&str>) -> Option<Self> {
		value.and_then(|v| Self::parse(v).ok())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for SessionId {
	type Err = TelemetryCoreError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// Identifier handed back for each ingested error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorId(pub Uuid);

impl ErrorId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for ErrorId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ErrorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ErrorId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn project_id_rejects_blank() {
		assert!(matches!(
			ProjectId::parse(""),
			Err(TelemetryCoreError::MissingProjectId)
		));
		assert!(matches!(
			ProjectId::parse("   "),
			Err(TelemetryCoreError::MissingProjectId)
		));
	}

	#[test]
	fn project_id_trims() {
		let id = ProjectId::parse("  p1 ").unwrap();
		assert_eq!(id.as_str(), "p1");
		assert!(!id.is_unscoped());
	}

	#[test]
	fn unscoped_project_survives_parsing() {
		let id = ProjectId::unscoped();
		assert!(id.is_unscoped());
		assert_eq!(id.to_string(), UNSCOPED_PROJECT);
		assert_eq!(ProjectId::parse(id.as_str()).unwrap(), id);
		assert_eq!(serde_json::to_string(&id).unwrap(), "\"unscoped\"");
	}

	#[test]
	fn generated_session_id_has_expected_shape() {
		let id = SessionId::generate();
		let parts: Vec<&str> = id.as_str().split('_').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "session");
		assert!(parts[1].parse::<i64>().is_ok());
		assert_eq!(parts[2].len(), 7);
		assert!(parts[2]
			.chars()
			.all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
	}

	#[test]
	fn generated_session_ids_differ() {
		assert_ne!(SessionId::generate(), SessionId::generate());
	}

	#[test]
	fn session_id_from_optional_treats_blank_as_absent() {
		assert_eq!(SessionId::from_optional(None), None);
		assert_eq!(SessionId::from_optional(Some("")), None);
		assert_eq!(
			SessionId::from_optional(Some("s1")),
			Some(SessionId::parse("s1").unwrap())
		);
	}

	#[test]
	fn session_id_serializes_as_plain_string() {
		let id = SessionId::parse("s1").unwrap();
		assert_eq!(serde_json::to_string(&id).unwrap(), "\"s1\"");
	}

	#[test]
	fn error_id_roundtrips_through_display() {
		let id = ErrorId::new();
		let parsed: ErrorId = id.to_string().parse().unwrap();
		assert_eq!(id, parsed);
	}

	#[test]
	fn reject_policy_requires_header() {
		let policy = MissingProjectPolicy::Reject;
		assert_eq!(policy.resolve(Some(" p1 "), None).unwrap().as_str(), "p1");
		assert!(matches!(
			policy.resolve(None, None),
			Err(TelemetryCoreError::MissingProjectId)
		));
		assert!(policy.resolve(Some("  "), None).is_err());
	}

	#[test]
	fn passthrough_policy_falls_back() {
		let policy = MissingProjectPolicy::Passthrough;
		let default = ProjectId::parse("fallback").unwrap();
		assert_eq!(policy.resolve(None, Some(&default)).unwrap(), default);
		assert!(policy.resolve(Some(""), None).unwrap().is_unscoped());
		assert_eq!(policy.resolve(Some("p2"), Some(&default)).unwrap().as_str(), "p2");
	}

	#[test]
	fn policy_parses_case_insensitively() {
		assert_eq!(
			"PassThrough".parse::<MissingProjectPolicy>().unwrap(),
			MissingProjectPolicy::Passthrough
		);
		assert!("ignore".parse::<MissingProjectPolicy>().is_err());
		assert_eq!(MissingProjectPolicy::default(), MissingProjectPolicy::Reject);
	}

	proptest! {
		#[test]
		fn non_blank_project_ids_parse(s in "[a-zA-Z0-9_-]{1,40}") {
			let id = ProjectId::parse(&s).unwrap();
			prop_assert_eq!(id.as_str(), s.as_str());
		}

		#[test]
		fn session_id_display_roundtrip(s in "[a-z0-9_]{1,40}") {
			let id = SessionId::parse(&s).unwrap();
			let parsed: SessionId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}
}
