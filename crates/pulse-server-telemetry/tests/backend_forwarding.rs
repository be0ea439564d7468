// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gateway behaviour against an HTTP session backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
	body::Body,
	http::{Request, StatusCode},
	Router,
};
use pulse_server_telemetry::{
	router, GatewayConfig, GatewayState, HttpSessionBackend, InMemorySpanExporter, SharedState,
	SpanCorrelator, SpanStatus,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(base_url: &str) -> (Router, SharedState, InMemorySpanExporter) {
	let spans = InMemorySpanExporter::new();
	let backend = HttpSessionBackend::new(base_url, Duration::from_secs(2)).unwrap();
	let state = GatewayState::new(
		Arc::new(backend),
		SpanCorrelator::new(Arc::new(spans.clone())),
		GatewayConfig {
			forward_timeout: Duration::from_secs(2),
			..GatewayConfig::default()
		},
	)
	.shared();
	(router(state.clone()), state, spans)
}

async fn post(app: &Router, uri: &str, cookie: Option<&str>, body: Value) -> (StatusCode, Value) {
	let mut request = Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.header("x-project-id", "p1");
	if let Some(cookie) = cookie {
		request = request.header("cookie", cookie);
	}
	let response = app
		.clone()
		.oneshot(request.body(Body::from(body.to_string())).unwrap())
		.await
		.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	(status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn session_start_with_unavailable_backend_fails_with_error_span() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/sessions/start"))
		.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
		.mount(&server)
		.await;

	let (app, _, spans) = gateway(&server.uri());
	let (status, body) = post(
		&app,
		"/telemetry/session/start",
		None,
		json!({"sessionId": "s1", "userId": "u1"}),
	)
	.await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(
		body,
		json!({"success": false, "message": "Failed to start session"})
	);

	let finished = spans.named("session.start");
	assert_eq!(finished.len(), 1);
	assert_eq!(
		finished[0].status,
		SpanStatus::Error("Backend responded with status 503: maintenance".to_string())
	);
}

#[tokio::test]
async fn event_succeeds_with_unreachable_backend() {
	let (app, state, spans) = gateway("http://127.0.0.1:1");
	let (status, body) = post(
		&app,
		"/telemetry/event",
		None,
		json!({"eventName": "checkout_click", "sessionId": "s1"}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"success": true}));
	assert!(state.drain(Duration::from_secs(5)).await);
	assert_eq!(spans.named("event.process")[0].status, SpanStatus::Ok);
}

#[tokio::test]
async fn cookies_are_forwarded_verbatim() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/sessions/end"))
		.and(header("x-project-id", "p1"))
		.and(header("cookie", "session=abc123; csrf=xyz"))
		.and(body_partial_json(json!({"sessionId": "s1", "projectId": "p1"})))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let (app, _, _) = gateway(&server.uri());
	let (status, body) = post(
		&app,
		"/telemetry/session/end",
		Some("session=abc123; csrf=xyz"),
		json!({"sessionId": "s1"}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn pageview_starts_session_then_counts_signal() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/sessions/start"))
		.and(body_partial_json(json!({"sessionId": "s7", "userId": "u1"})))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/sessions/signal"))
		.and(body_partial_json(json!({"sessionId": "s7", "kind": "pageview"})))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let (app, state, _) = gateway(&server.uri());
	let (status, _) = post(
		&app,
		"/telemetry/pageview",
		None,
		json!({"page": "/dashboard", "sessionId": "s7", "userId": "u1"}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert!(state.drain(Duration::from_secs(2)).await);
}
