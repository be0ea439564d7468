// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP transport to the telemetry gateway.

use async_trait::async_trait;
use pulse_sessions_core::CallContext;
use pulse_telemetry_core::Envelope;
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, TelemetrySdkError};

/// Posts JSON bodies to gateway endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Posts `body` to `path` (for example `/telemetry/event`) and returns the
	/// gateway's envelope. Non-2xx statuses and `success: false` envelopes
	/// are errors.
	async fn post(&self, path: &str, ctx: &CallContext, body: &serde_json::Value)
		-> Result<Envelope>;
}

/// [`Transport`] backed by reqwest.
pub struct HttpTransport {
	base_url: String,
	client: Client,
}

impl HttpTransport {
	pub fn new(base_url: impl Into<String>, client: Client) -> Self {
		Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			client,
		}
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn post(
		&self,
		path: &str,
		ctx: &CallContext,
		body: &serde_json::Value,
	) -> Result<Envelope> {
		let url = format!("{}{}", self.base_url, path);
		let request = pulse_common_http::forward_headers(
			self.client.post(&url),
			ctx.project_id.as_str(),
			ctx.cookie.as_deref(),
		);

		let response = request.json(body).send().await?;
		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(TelemetrySdkError::ServerError {
				status: status.as_u16(),
				message,
			});
		}

		let envelope: Envelope = response.json().await?;
		if !envelope.success {
			return Err(TelemetrySdkError::Rejected(
				envelope.message.unwrap_or_default(),
			));
		}

		debug!(path, "Telemetry delivered");
		Ok(envelope)
	}
}
