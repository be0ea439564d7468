// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The single write path from application code to the gateway.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use pulse_sessions_core::CallContext;
use pulse_telemetry_core::{CustomEvent, DetachedTasks, ErrorRecord, PageView, ProjectId};
use serde::Serialize;
use tracing::warn;

use crate::transport::Transport;

pub(crate) const ERROR_PATH: &str = "/telemetry/error";
pub(crate) const EVENT_PATH: &str = "/telemetry/event";
pub(crate) const PAGEVIEW_PATH: &str = "/telemetry/pageview";

/// Marshals records into gateway calls.
///
/// Every `report_*` call returns immediately. Delivery runs as a detached
/// task whose failure is logged and otherwise invisible to the caller.
#[derive(Clone)]
pub struct EventReporter {
	transport: Arc<dyn Transport>,
	project_id: ProjectId,
	cookie: Arc<RwLock<Option<String>>>,
	tasks: DetachedTasks,
}

impl EventReporter {
	pub fn new(transport: Arc<dyn Transport>, project_id: ProjectId, tasks: DetachedTasks) -> Self {
		Self {
			transport,
			project_id,
			cookie: Arc::new(RwLock::new(None)),
			tasks,
		}
	}

	pub fn project_id(&self) -> &ProjectId {
		&self.project_id
	}

	/// Sets the session cookie string attached to every call.
	pub fn set_cookie(&self, cookie: Option<String>) {
		let mut guard = self.cookie.write().unwrap_or_else(|e| e.into_inner());
		*guard = cookie.filter(|c| !c.is_empty());
	}

	/// Context for an outbound call: project id plus current cookie.
	pub fn call_context(&self) -> CallContext {
		let cookie = self
			.cookie
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone();
		CallContext::new(self.project_id.clone()).with_cookie(cookie)
	}

	pub fn report_error(&self, record: ErrorRecord) {
		self.deliver("deliver.error", ERROR_PATH, &record);
	}

	pub fn report_event(&self, event: CustomEvent) {
		self.deliver("deliver.event", EVENT_PATH, &event);
	}

	pub fn report_page_view(&self, view: PageView) {
		self.deliver("deliver.pageview", PAGEVIEW_PATH, &view);
	}

	/// Waits up to `timeout` for in-flight deliveries.
	pub async fn flush(&self, timeout: Duration) -> bool {
		self.tasks.drain(timeout).await
	}

	fn deliver<T: Serialize>(&self, label: &'static str, path: &'static str, record: &T) {
		let body = match serde_json::to_value(record) {
			Ok(body) => body,
			Err(e) => {
				warn!(path, error = %e, "Dropping telemetry record that failed to serialize");
				return;
			}
		};

		let transport = Arc::clone(&self.transport);
		let ctx = self.call_context();
		self.tasks.spawn(label, async move {
			transport.post(path, &ctx, &body).await.map(|_| ())
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::RecordingTransport;
	use chrono::Utc;
	use pulse_telemetry_core::{EventData, SessionId};

	fn reporter(transport: Arc<RecordingTransport>) -> EventReporter {
		EventReporter::new(
			transport,
			ProjectId::parse("p1").unwrap(),
			DetachedTasks::new(Duration::from_secs(1)),
		)
	}

	fn event(name: &str) -> CustomEvent {
		CustomEvent {
			event_name: name.to_string(),
			event_data: EventData::new().with("plan", "pro"),
			user_id: "u1".to_string(),
			session_id: SessionId::parse("s1").unwrap(),
			url: "/checkout".to_string(),
			timestamp: Utc::now(),
		}
	}

	#[tokio::test]
	async fn event_is_posted_with_project_and_cookie() {
		let transport = Arc::new(RecordingTransport::new());
		let reporter = reporter(transport.clone());
		reporter.set_cookie(Some("sid=abc".to_string()));

		reporter.report_event(event("checkout_click"));
		assert!(reporter.flush(Duration::from_secs(1)).await);

		let posts = transport.posts();
		assert_eq!(posts.len(), 1);
		assert_eq!(posts[0].path, EVENT_PATH);
		assert_eq!(posts[0].project_id, "p1");
		assert_eq!(posts[0].cookie.as_deref(), Some("sid=abc"));
		assert_eq!(posts[0].body["eventName"], "checkout_click");
		assert_eq!(posts[0].body["eventData"]["plan"], "pro");
	}

	#[tokio::test]
	async fn delivery_failure_is_not_surfaced() {
		let transport = Arc::new(RecordingTransport::failing());
		let reporter = reporter(transport.clone());

		reporter.report_event(event("a"));
		reporter.report_event(event("b"));
		assert!(reporter.flush(Duration::from_secs(1)).await);
		assert_eq!(transport.posts().len(), 2);
	}

	#[test]
	fn reporting_without_runtime_does_not_panic() {
		let reporter = reporter(Arc::new(RecordingTransport::new()));
		reporter.report_event(event("offline"));
	}
}
