// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry SDK.

use pulse_sessions_core::SessionsError;
use thiserror::Error;

/// Result type alias for telemetry SDK operations.
pub type Result<T> = std::result::Result<T, TelemetrySdkError>;

/// Errors that can occur in the telemetry SDK.
///
/// Reporting calls never return these; delivery failures are logged by the
/// detached task that performed the delivery.
#[derive(Debug, Error)]
pub enum TelemetrySdkError {
	/// Invalid base URL.
	#[error("invalid base URL")]
	InvalidBaseUrl,

	/// Missing required project ID.
	#[error("project ID is required")]
	MissingProjectId,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Gateway returned a non-2xx status.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Response body.
		message: String,
	},

	/// Gateway answered 2xx with `success: false`.
	#[error("gateway rejected request: {0}")]
	Rejected(String),

	/// Installing the global capture hooks failed.
	#[error("error tracking setup failed: {0}")]
	CaptureSetup(String),

	/// Session call failed.
	#[error("session error: {0}")]
	Session(#[from] SessionsError),

	/// Failed to serialize a record.
	#[error("serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),
}
