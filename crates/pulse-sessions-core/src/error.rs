// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sessions system.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionsError>;

/// Errors that can occur while talking to a session API.
#[derive(Debug, Error)]
pub enum SessionsError {
	/// The remote answered with a non-2xx status.
	#[error("Backend responded with status {status}: {body}")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body as returned by the remote.
		body: String,
	},

	/// The remote could not be reached.
	#[error("backend unreachable: {0}")]
	Unreachable(String),

	/// The call exceeded its time budget.
	#[error("backend call timed out")]
	Timeout,

	/// Invalid session ID
	#[error("invalid session ID: {0:?}")]
	InvalidSessionId(String),

	/// Invalid signal kind string
	#[error("invalid signal kind: {0}")]
	InvalidSignalKind(String),

	/// Serialization error
	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for SessionsError {
	fn from(e: serde_json::Error) -> Self {
		SessionsError::Serialization(e.to_string())
	}
}
