// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the session store.

use thiserror::Error;

/// Errors that can occur in the session store.
#[derive(Debug, Error)]
pub enum SessionsServerError {
	/// Database error
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	/// Migration or pool setup error
	#[error("database setup error: {0}")]
	Setup(String),

	/// Session not found
	#[error("session not found: {0}")]
	SessionNotFound(String),

	/// A required identifier was absent or blank
	#[error("missing {0}")]
	MissingField(&'static str),

	/// Stored or submitted data could not be interpreted
	#[error("invalid session data: {0}")]
	InvalidData(String),

	/// Core error
	#[error("sessions core error: {0}")]
	Core(#[from] pulse_sessions_core::SessionsError),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionsServerError>;
