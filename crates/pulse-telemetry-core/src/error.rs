// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry core.

use thiserror::Error;

/// Result type alias for telemetry core operations.
pub type Result<T> = std::result::Result<T, TelemetryCoreError>;

/// Errors that can occur when building or parsing telemetry types.
#[derive(Debug, Error)]
pub enum TelemetryCoreError {
	/// The project identifier was absent or blank.
	#[error("project ID is required")]
	MissingProjectId,

	/// The session identifier was absent or blank.
	#[error("invalid session ID: {0:?}")]
	InvalidSessionId(String),

	/// Unknown error source string.
	#[error("invalid error source: {0}")]
	InvalidErrorSource(String),

	/// Unknown missing-project policy name.
	#[error("invalid missing project policy: {0}")]
	InvalidPolicy(String),

	/// Event data was not a JSON object.
	#[error("event data must be a JSON object")]
	InvalidEventData,

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
