// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry client for reporting errors, events, page views and sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use pulse_sessions_core::{CallContext, SessionLifecycleClient, StartPolicy};
use pulse_telemetry_core::{
	CustomEvent, DetachedTasks, ErrorRecord, EventData, PageView, ProjectId, SessionId,
	ANONYMOUS_USER,
};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::capture::{self, ErrorTracker, TrackingConfig};
use crate::error::{Result, TelemetrySdkError};
use crate::reporter::EventReporter;
use crate::session::{GatewaySessionApi, InMemorySessionIdStore, SessionIdProvider, SessionIdStore};
use crate::transport::{HttpTransport, Transport};

/// Configuration for the telemetry client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Timeout for each request to the gateway.
	pub request_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			request_timeout: pulse_common_http::DEFAULT_FORWARD_TIMEOUT,
		}
	}
}

/// Builder for constructing a TelemetryClient.
pub struct TelemetryClientBuilder {
	base_url: Option<String>,
	project_id: Option<String>,
	environment: Option<String>,
	user_id: Option<String>,
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
	session_store: Option<Arc<dyn SessionIdStore>>,
	runtime: Option<Handle>,
}

impl TelemetryClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			base_url: None,
			project_id: None,
			environment: None,
			user_id: None,
			config: ClientConfig::default(),
			transport: None,
			session_store: None,
			runtime: None,
		}
	}

	/// Sets the base URL of the telemetry gateway.
	///
	/// Example: `https://dashboard.example.com`
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Sets the project ID sent with every request.
	pub fn project_id(mut self, id: impl Into<String>) -> Self {
		self.project_id = Some(id.into());
		self
	}

	/// Sets the environment name.
	///
	/// Example: `production`, `staging`, `development`
	pub fn environment(mut self, env: impl Into<String>) -> Self {
		self.environment = Some(env.into());
		self
	}

	/// Sets the initial user id. Unidentified users are reported as `anonymous`.
	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Replaces the HTTP transport, for example with an in-process one.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Sets where the session id is persisted. Defaults to memory.
	pub fn session_store(mut self, store: Arc<dyn SessionIdStore>) -> Self {
		self.session_store = Some(store);
		self
	}

	/// Sets the runtime used for deliveries triggered outside of it.
	///
	/// Defaults to the runtime `build` is called from, if any.
	pub fn runtime(mut self, handle: Handle) -> Self {
		self.runtime = Some(handle);
		self
	}

	/// Builds the TelemetryClient.
	pub fn build(self) -> Result<TelemetryClient> {
		let project_id = self
			.project_id
			.as_deref()
			.and_then(|id| ProjectId::parse(id).ok())
			.ok_or(TelemetrySdkError::MissingProjectId)?;

		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => {
				let base_url = self.base_url.ok_or(TelemetrySdkError::InvalidBaseUrl)?;
				if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
					return Err(TelemetrySdkError::InvalidBaseUrl);
				}
				let http_client =
					pulse_common_http::new_client_with_timeout(self.config.request_timeout)?;
				Arc::new(HttpTransport::new(base_url, http_client))
			}
		};

		let tasks = match self.runtime {
			Some(handle) => DetachedTasks::with_handle(self.config.request_timeout, handle),
			None => DetachedTasks::new(self.config.request_timeout),
		};

		let reporter = EventReporter::new(Arc::clone(&transport), project_id.clone(), tasks.clone());
		let lifecycle = SessionLifecycleClient::new(
			Arc::new(GatewaySessionApi::new(transport)),
			StartPolicy::OncePerSession,
			tasks,
		);
		let sessions = SessionIdProvider::new(
			self.session_store
				.unwrap_or_else(|| Arc::new(InMemorySessionIdStore::new())),
		);
		let environment = self
			.environment
			.unwrap_or_else(|| "production".to_string());

		info!(project.id = %project_id, environment = %environment, "Telemetry client initialized");

		Ok(TelemetryClient {
			inner: Arc::new(TelemetryClientInner {
				project_id,
				environment,
				user_id: RwLock::new(self.user_id.filter(|u| !u.is_empty())),
				current_url: RwLock::new(String::new()),
				reporter,
				lifecycle,
				sessions,
				config: self.config,
				closed: AtomicBool::new(false),
			}),
		})
	}
}

impl Default for TelemetryClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct TelemetryClientInner {
	project_id: ProjectId,
	environment: String,
	user_id: RwLock<Option<String>>,
	current_url: RwLock<String>,
	reporter: EventReporter,
	lifecycle: SessionLifecycleClient,
	sessions: SessionIdProvider,
	config: ClientConfig,
	closed: AtomicBool,
}

/// Client for reporting telemetry to the gateway.
///
/// # Example
///
/// ```ignore
/// use pulse_telemetry::{TelemetryClient, TrackingConfig};
///
/// let client = TelemetryClient::builder()
///     .base_url("https://dashboard.example.com")
///     .project_id("proj_xxx")
///     .environment("production")
///     .build()?;
///
/// // Install global hooks and get the reporting capability
/// let tracker = client.setup_error_tracking(TrackingConfig::default());
///
/// client.report_page_view("/dashboard", "");
/// tracker.report_custom_event("checkout_click", EventData::new());
///
/// // Close the session before exit
/// client.end_session().await?;
/// client.shutdown().await;
/// ```
#[derive(Clone)]
pub struct TelemetryClient {
	inner: Arc<TelemetryClientInner>,
}

impl TelemetryClient {
	/// Creates a new builder for constructing a TelemetryClient.
	pub fn builder() -> TelemetryClientBuilder {
		TelemetryClientBuilder::new()
	}

	pub fn project_id(&self) -> &ProjectId {
		&self.inner.project_id
	}

	pub fn environment(&self) -> &str {
		&self.inner.environment
	}

	/// The current session id, generated on first use.
	pub fn session_id(&self) -> SessionId {
		self.inner.sessions.current()
	}

	/// Starts a fresh session id. The next page view starts it remotely.
	pub fn reset_session(&self) -> SessionId {
		self.inner.sessions.rotate()
	}

	/// The current user id, or `anonymous`.
	pub fn user_id(&self) -> String {
		self.inner
			.user_id
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
			.unwrap_or_else(|| ANONYMOUS_USER.to_string())
	}

	pub fn set_user_id(&self, user_id: Option<&str>) {
		let mut guard = self.inner.user_id.write().unwrap_or_else(|e| e.into_inner());
		*guard = user_id.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string);
	}

	/// The location attached to subsequent records.
	pub fn current_url(&self) -> String {
		self.inner
			.current_url
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	pub fn set_current_url(&self, url: impl Into<String>) {
		let mut guard = self.inner.current_url.write().unwrap_or_else(|e| e.into_inner());
		*guard = url.into();
	}

	/// Sets the cookie string forwarded with every call.
	pub fn set_cookie(&self, cookie: Option<String>) {
		self.inner.reporter.set_cookie(cookie);
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Installs global error hooks and returns the reporting capability.
	///
	/// Never fails: if installation fails a no-op tracker is returned.
	pub fn setup_error_tracking(&self, config: TrackingConfig) -> ErrorTracker {
		capture::setup_client_error_tracking(self, config)
	}

	/// Reports a page view and makes sure the session has been started.
	///
	/// The session start is attempted once per session id; later page views in
	/// the same session only report themselves.
	pub fn report_page_view(&self, page: impl Into<String>, referrer: impl Into<String>) {
		if self.is_closed() {
			debug!("Dropping page view, client is shut down");
			return;
		}

		let page = page.into();
		let session_id = self.session_id();
		let user_id = self.user_id();
		self.set_current_url(page.clone());

		self.inner.reporter.report_page_view(PageView {
			page,
			referrer: referrer.into(),
			user_agent: pulse_common_http::user_agent(),
			user_id: user_id.clone(),
			session_id: session_id.clone(),
			timestamp: Utc::now(),
		});
		self.inner.lifecycle.on_signal(
			self.inner.reporter.call_context(),
			session_id,
			Some(&user_id),
			None,
		);
	}

	/// Reports a named event with arbitrary data.
	pub fn report_event(&self, name: impl Into<String>, data: EventData) {
		if self.is_closed() {
			debug!("Dropping event, client is shut down");
			return;
		}

		self.inner.reporter.report_event(CustomEvent {
			event_name: name.into(),
			event_data: data,
			user_id: self.user_id(),
			session_id: self.session_id(),
			url: self.current_url(),
			timestamp: Utc::now(),
		});
	}

	/// Reports a fully built error record.
	pub fn report_error_record(&self, record: ErrorRecord) {
		if self.is_closed() {
			debug!("Dropping error record, client is shut down");
			return;
		}
		self.inner.reporter.report_error(record);
	}

	/// Ends the current session and waits for the gateway to accept it.
	pub async fn end_session(&self) -> Result<()> {
		let ctx: CallContext = self.inner.reporter.call_context();
		let session_id = self.session_id();
		self.inner.lifecycle.end_session(&ctx, &session_id).await?;
		Ok(())
	}

	/// Waits up to `timeout` for in-flight deliveries and session calls.
	pub async fn flush(&self, timeout: Duration) -> bool {
		self.inner.reporter.flush(timeout).await
	}

	/// Stops accepting new reports and flushes outstanding ones.
	pub async fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		let drained = self.flush(self.inner.config.request_timeout).await;
		info!(drained, "Telemetry client shut down");
	}

	pub(crate) fn reporter(&self) -> &EventReporter {
		&self.inner.reporter
	}

	pub(crate) fn tasks(&self) -> &DetachedTasks {
		self.inner.lifecycle.tasks()
	}
}
