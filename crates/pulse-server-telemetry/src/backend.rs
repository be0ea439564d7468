// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client for the backend session store.

use std::time::Duration;

use async_trait::async_trait;
use pulse_common_http::{forward_headers, new_client_with_timeout};
use pulse_sessions_core::{
	CallContext, EndSession, SessionApi, SessionsError, SignalRecord, StartSession,
};
use serde::Serialize;
use tracing::{debug, instrument};

pub const START_PATH: &str = "/api/sessions/start";
pub const END_PATH: &str = "/api/sessions/end";
pub const SIGNAL_PATH: &str = "/api/sessions/signal";

/// [`SessionApi`] backed by the session store's HTTP API.
///
/// Every call carries the request's project id and forwards the inbound
/// cookie string unchanged. Any non-2xx answer is a rejection.
#[derive(Debug, Clone)]
pub struct HttpSessionBackend {
	base_url: String,
	client: reqwest::Client,
}

impl HttpSessionBackend {
	/// Creates a backend whose calls are bounded by `timeout`.
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
		Ok(Self::with_client(base_url, new_client_with_timeout(timeout)?))
	}

	pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		Self { base_url, client }
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	async fn post<T: Serialize + Sync>(
		&self,
		path: &str,
		ctx: &CallContext,
		body: &T,
	) -> pulse_sessions_core::Result<()> {
		let url = format!("{}{}", self.base_url, path);
		let request = forward_headers(
			self.client.post(&url),
			ctx.project_id.as_str(),
			ctx.cookie.as_deref(),
		)
		.json(body);

		let response = request.send().await.map_err(transport_error)?;
		let status = response.status();
		if status.is_success() {
			debug!(%url, status = status.as_u16(), "Backend accepted session call");
			return Ok(());
		}

		let body = response.text().await.unwrap_or_default();
		Err(SessionsError::Rejected {
			status: status.as_u16(),
			body,
		})
	}
}

fn transport_error(error: reqwest::Error) -> SessionsError {
	if error.is_timeout() {
		SessionsError::Timeout
	} else {
		SessionsError::Unreachable(error.to_string())
	}
}

#[async_trait]
impl SessionApi for HttpSessionBackend {
	#[instrument(skip(self, ctx, request), fields(session.id = %request.session_id))]
	async fn start_session(
		&self,
		ctx: &CallContext,
		request: &StartSession,
	) -> pulse_sessions_core::Result<()> {
		self.post(START_PATH, ctx, request).await
	}

	#[instrument(skip(self, ctx, request), fields(session.id = %request.session_id))]
	async fn end_session(
		&self,
		ctx: &CallContext,
		request: &EndSession,
	) -> pulse_sessions_core::Result<()> {
		self.post(END_PATH, ctx, request).await
	}

	#[instrument(skip(self, ctx, signal), fields(session.id = %signal.session_id, kind = %signal.kind))]
	async fn record_signal(
		&self,
		ctx: &CallContext,
		signal: &SignalRecord,
	) -> pulse_sessions_core::Result<()> {
		self.post(SIGNAL_PATH, ctx, signal).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_telemetry_core::{ProjectId, SessionId};
	use wiremock::matchers::{body_partial_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn ctx(cookie: Option<&str>) -> CallContext {
		CallContext::new(ProjectId::parse("p1").unwrap()).with_cookie(cookie.map(str::to_string))
	}

	fn start() -> StartSession {
		StartSession::new(
			SessionId::parse("s1").unwrap(),
			ProjectId::parse("p1").unwrap(),
			Some("u1"),
		)
	}

	fn backend(server: &MockServer) -> HttpSessionBackend {
		HttpSessionBackend::new(format!("{}/", server.uri()), Duration::from_secs(2)).unwrap()
	}

	#[tokio::test]
	async fn start_forwards_project_and_cookie() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(START_PATH))
			.and(header("x-project-id", "p1"))
			.and(header("cookie", "sid=abc; theme=dark"))
			.and(body_partial_json(serde_json::json!({
				"sessionId": "s1",
				"projectId": "p1",
				"userId": "u1"
			})))
			.respond_with(ResponseTemplate::new(201))
			.expect(1)
			.mount(&server)
			.await;

		backend(&server)
			.start_session(&ctx(Some("sid=abc; theme=dark")), &start())
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn non_success_status_is_rejection_with_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(END_PATH))
			.respond_with(ResponseTemplate::new(503).set_body_string("store offline"))
			.mount(&server)
			.await;

		let end = EndSession::new(
			SessionId::parse("s1").unwrap(),
			ProjectId::parse("p1").unwrap(),
		);
		let err = backend(&server).end_session(&ctx(None), &end).await.unwrap_err();
		match err {
			SessionsError::Rejected { status, body } => {
				assert_eq!(status, 503);
				assert_eq!(body, "store offline");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn signal_posts_kind() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(SIGNAL_PATH))
			.and(body_partial_json(serde_json::json!({"kind": "pageview"})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let signal = SignalRecord {
			session_id: SessionId::parse("s1").unwrap(),
			project_id: ProjectId::parse("p1").unwrap(),
			user_id: "anonymous".to_string(),
			kind: pulse_sessions_core::SignalKind::PageView,
			timestamp: chrono::Utc::now(),
		};
		backend(&server)
			.record_signal(&ctx(None), &signal)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn unreachable_backend_is_reported() {
		let backend =
			HttpSessionBackend::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
		let err = backend.start_session(&ctx(None), &start()).await.unwrap_err();
		assert!(matches!(
			err,
			SessionsError::Unreachable(_) | SessionsError::Timeout
		));
	}

	#[test]
	fn base_url_is_normalized() {
		let backend = HttpSessionBackend::with_client("http://store:8081/", reqwest::Client::new());
		assert_eq!(backend.base_url(), "http://store:8081");
	}
}
