// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gateway error taxonomy and its mapping onto the response envelope.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use pulse_sessions_core::SessionsError;
use pulse_telemetry_core::Envelope;
use thiserror::Error;

/// Message returned when a request has no usable project id.
pub const MISSING_PROJECT_MESSAGE: &str = "Missing project id";

/// Failures a gateway request can end in.
///
/// The `Display` output is the full server-side description and is what ends
/// up in logs and span status. Callers only ever see [`public_message`].
///
/// [`public_message`]: GatewayError::public_message
#[derive(Debug, Error)]
pub enum GatewayError {
	/// No `x-project-id` header and the policy rejects such requests.
	#[error("missing project id")]
	MissingProjectId,

	/// The request body could not be parsed as the expected payload.
	#[error("invalid payload: {reason}")]
	PayloadParse {
		message: &'static str,
		reason: String,
	},

	/// The backend answered with a non-2xx status.
	#[error("Backend responded with status {status}: {body}")]
	BackendRejected {
		message: &'static str,
		status: u16,
		body: String,
	},

	/// The backend could not be reached or did not answer in time.
	#[error("backend unreachable: {reason}")]
	BackendUnreachable {
		message: &'static str,
		reason: String,
	},
}

impl GatewayError {
	pub fn payload(message: &'static str, reason: impl ToString) -> Self {
		Self::PayloadParse {
			message,
			reason: reason.to_string(),
		}
	}

	/// Classifies a backend failure, attaching the endpoint's public message.
	pub fn backend(message: &'static str, error: SessionsError) -> Self {
		match error {
			SessionsError::Rejected { status, body } => Self::BackendRejected {
				message,
				status,
				body,
			},
			SessionsError::InvalidSessionId(id) => Self::PayloadParse {
				message,
				reason: format!("invalid session id {id:?}"),
			},
			other => Self::BackendUnreachable {
				message,
				reason: other.to_string(),
			},
		}
	}

	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::MissingProjectId => StatusCode::BAD_REQUEST,
			Self::PayloadParse { .. }
			| Self::BackendRejected { .. }
			| Self::BackendUnreachable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// The generic message placed in the failure envelope.
	pub fn public_message(&self) -> &'static str {
		match self {
			Self::MissingProjectId => MISSING_PROJECT_MESSAGE,
			Self::PayloadParse { message, .. }
			| Self::BackendRejected { message, .. }
			| Self::BackendUnreachable { message, .. } => message,
		}
	}
}

impl IntoResponse for GatewayError {
	fn into_response(self) -> Response {
		(
			self.status_code(),
			Json(Envelope::failure(self.public_message())),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::to_bytes;

	async fn body_json(error: GatewayError) -> (StatusCode, serde_json::Value) {
		let response = error.into_response();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap())
	}

	#[tokio::test]
	async fn missing_project_is_bad_request() {
		let (status, body) = body_json(GatewayError::MissingProjectId).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(
			body,
			serde_json::json!({"success": false, "message": "Missing project id"})
		);
	}

	#[tokio::test]
	async fn backend_rejection_does_not_leak_body() {
		let error = GatewayError::backend(
			"Failed to start session",
			SessionsError::Rejected {
				status: 503,
				body: "db pool exhausted".to_string(),
			},
		);
		assert_eq!(
			error.to_string(),
			"Backend responded with status 503: db pool exhausted"
		);

		let (status, body) = body_json(error).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(
			body,
			serde_json::json!({"success": false, "message": "Failed to start session"})
		);
	}

	#[test]
	fn timeout_is_unreachable() {
		let error = GatewayError::backend("Failed to end session", SessionsError::Timeout);
		assert!(matches!(error, GatewayError::BackendUnreachable { .. }));
		assert_eq!(error.public_message(), "Failed to end session");
		assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn payload_error_keeps_reason_for_logs() {
		let error = GatewayError::payload("Failed to process event", "expected value at line 1");
		assert_eq!(error.to_string(), "invalid payload: expected value at line 1");
		assert_eq!(error.public_message(), "Failed to process event");
	}
}
