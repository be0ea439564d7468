// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Uniform response envelope returned by every gateway endpoint.

use serde::{Deserialize, Serialize};

/// `{success, message?}` plus the optional ids some endpoints hand back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_id: Option<String>,
}

impl Envelope {
	#[must_use]
	pub fn ok() -> Self {
		Self {
			success: true,
			message: None,
			session_id: None,
			error_id: None,
		}
	}

	#[must_use]
	pub fn ok_with_session(session_id: impl Into<String>) -> Self {
		Self {
			session_id: Some(session_id.into()),
			..Self::ok()
		}
	}

	#[must_use]
	pub fn ok_with_error_id(error_id: impl Into<String>) -> Self {
		Self {
			error_id: Some(error_id.into()),
			..Self::ok()
		}
	}

	#[must_use]
	pub fn failure(message: impl Into<String>) -> Self {
		Self {
			success: false,
			message: Some(message.into()),
			session_id: None,
			error_id: None,
		}
	}
}
