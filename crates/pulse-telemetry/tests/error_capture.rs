// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end capture against a mock gateway.

use std::time::Duration;

use pulse_telemetry::{
	BoundaryFailure, CapturedError, Component, ErrorBoundary, TelemetryClient, TrackingConfig,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway() -> MockServer {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path_regex("^/telemetry/.*"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.mount(&server)
		.await;
	server
}

async fn error_bodies(server: &MockServer) -> Vec<Value> {
	server
		.received_requests()
		.await
		.unwrap_or_default()
		.into_iter()
		.filter(|r| r.url.path() == "/telemetry/error")
		.filter_map(|r| r.body_json::<Value>().ok())
		.collect()
}

fn client(server: &MockServer, project: &str) -> TelemetryClient {
	TelemetryClient::builder()
		.base_url(server.uri())
		.project_id(project)
		.environment("staging")
		.build()
		.unwrap()
}

#[tokio::test]
async fn double_setup_reports_an_uncaught_panic_once() {
	let server = gateway().await;
	let client = client(&server, "it-double-setup");

	let first = client.setup_error_tracking(TrackingConfig::default());
	let second = client.setup_error_tracking(TrackingConfig::default().user_id("u1"));
	assert!(first.owns_hooks());
	assert!(!second.owns_hooks());

	let _ = std::thread::spawn(|| panic!("it-double-setup boom")).join();
	client.flush(Duration::from_secs(2)).await;

	let matching: Vec<Value> = error_bodies(&server)
		.await
		.into_iter()
		.filter(|b| b["message"] == "it-double-setup boom")
		.collect();
	assert_eq!(matching.len(), 1);
	assert_eq!(matching[0]["source"], "uncaught");
	assert_eq!(matching[0]["environment"], "staging");
	assert_eq!(matching[0]["userId"], "u1");

	first.cleanup();
}

struct Chart {
	broken: bool,
}

impl Component for Chart {
	type View = String;

	fn name(&self) -> &str {
		"Chart"
	}

	fn render(&mut self) -> Result<String, CapturedError> {
		if self.broken {
			Err(CapturedError::new("TypeError", "series is undefined"))
		} else {
			Ok("<chart>".to_string())
		}
	}
}

#[tokio::test]
async fn boundary_reports_with_component_stack_and_resets() {
	let server = gateway().await;
	let client = client(&server, "it-boundary");
	let tracker = client.setup_error_tracking(
		TrackingConfig::default().issue_tracker_url("https://issues.example.com/new"),
	);

	let fallback = |failure: &BoundaryFailure, url: Option<&str>| {
		format!("{} - report at {}", failure.error.message, url.unwrap_or(""))
	};
	let mut boundary =
		ErrorBoundary::new(Chart { broken: true }, fallback, &tracker).within(["Dashboard"]);

	assert_eq!(
		boundary.render(),
		"series is undefined - report at https://issues.example.com/new"
	);
	tracker.flush(Duration::from_secs(2)).await;

	// Panics raised by other tests reach every installed tracker, so match on
	// the message.
	let errors: Vec<Value> = error_bodies(&server)
		.await
		.into_iter()
		.filter(|b| b["message"] == "series is undefined")
		.collect();
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0]["source"], "manual");
	assert_eq!(errors[0]["componentStack"], "    at Chart\n    at Dashboard");

	boundary.child_mut().broken = false;
	boundary.reset();
	assert_eq!(boundary.render(), "<chart>");

	tracker.cleanup();
}

#[tokio::test]
async fn report_error_is_silent_when_gateway_is_unreachable() {
	let client = TelemetryClient::builder()
		.base_url("http://127.0.0.1:9")
		.project_id("it-unreachable")
		.request_timeout(Duration::from_millis(200))
		.build()
		.unwrap();
	let tracker = client.setup_error_tracking(TrackingConfig::default());

	tracker.report_error("nobody is listening", None);
	tracker.report_custom_event("still_fine", Default::default());
	client.report_page_view("/offline", "");
	assert!(client.flush(Duration::from_secs(2)).await);

	assert!(client.end_session().await.is_err());
	tracker.cleanup();
}
