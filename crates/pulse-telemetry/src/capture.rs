// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Global error capture.
//!
//! [`setup_client_error_tracking`] installs the process-wide hooks (the panic
//! hook, which is the uncaught-exception analogue) at most once per project
//! and returns an [`ErrorTracker`], the capability application code and
//! error boundaries report through.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use pulse_telemetry_core::{
	BrowserInfo, ErrorRecord, ErrorSource, EventData, ProjectId, SessionId,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::TelemetryClient;
use crate::error::{Result, TelemetrySdkError};

/// Window in which identical errors are reported only once.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(10);

/// Error type recorded for failed background tasks.
pub const UNHANDLED_REJECTION: &str = "UnhandledRejection";

/// Options for [`setup_client_error_tracking`].
#[derive(Debug, Clone, Default)]
pub struct TrackingConfig {
	/// Identifies the user on every subsequent record.
	pub user_id: Option<String>,
	/// Link shown by boundary fallbacks so users can file an issue.
	pub issue_tracker_url: Option<String>,
}

impl TrackingConfig {
	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn issue_tracker_url(mut self, url: impl Into<String>) -> Self {
		self.issue_tracker_url = Some(url.into());
		self
	}
}

/// A failure normalized for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
	pub type_name: String,
	pub message: String,
	pub stack_trace: String,
}

impl CapturedError {
	pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			message: message.into(),
			stack_trace: Backtrace::force_capture().to_string(),
		}
	}

	#[must_use]
	pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
		self.stack_trace = stack_trace.into();
		self
	}

	/// Captures a typed error. The type name is the error's unqualified Rust
	/// type name and the stack trace lists its source chain before the
	/// backtrace.
	pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
		let mut stack = String::new();
		let mut source = error.source();
		while let Some(cause) = source {
			stack.push_str("caused by: ");
			stack.push_str(&cause.to_string());
			stack.push('\n');
			source = cause.source();
		}
		stack.push_str(&Backtrace::force_capture().to_string());

		Self {
			type_name: short_type_name(std::any::type_name::<E>()),
			message: error.to_string(),
			stack_trace: stack,
		}
	}

	/// Captures a panic payload as produced by the panic hook or `catch_unwind`.
	pub fn from_panic(payload: &(dyn Any + Send), location: Option<String>) -> Self {
		let message = panic_message(payload);
		let mut stack = String::new();
		if let Some(location) = location {
			stack.push_str("at ");
			stack.push_str(&location);
			stack.push('\n');
		}
		stack.push_str(&Backtrace::force_capture().to_string());

		Self {
			type_name: "Panic".to_string(),
			message,
			stack_trace: stack,
		}
	}
}

impl From<&str> for CapturedError {
	fn from(message: &str) -> Self {
		Self::new("Error", message)
	}
}

impl From<String> for CapturedError {
	fn from(message: String) -> Self {
		Self::new("Error", message)
	}
}

fn short_type_name(full: &str) -> String {
	let base = full.split('<').next().unwrap_or(full);
	base.rsplit("::").next().unwrap_or(base).to_string()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}

/// Callback invoked by global hooks.
pub type FailureHandler = Arc<dyn Fn(CapturedError) + Send + Sync>;

/// Identifies one handler registration with a [`GlobalHooks`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
	/// Allocates a process-unique id.
	pub fn next() -> Self {
		HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::SeqCst))
	}
}

/// Process-wide failure hooks.
pub trait GlobalHooks: Send + Sync {
	/// Registers `handler` to be called for every uncaught failure.
	fn install(&self, handler: FailureHandler) -> Result<HookId>;

	/// Removes a registration made by `install`.
	fn uninstall(&self, id: HookId);
}

/// [`GlobalHooks`] backed by the process panic hook.
///
/// The first install chains a dispatcher in front of the existing panic hook;
/// the previous hook keeps running after the handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicHooks;

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);
static PANIC_HANDLERS: OnceLock<Mutex<Vec<(HookId, FailureHandler)>>> = OnceLock::new();
static PANIC_DISPATCHER: OnceLock<()> = OnceLock::new();

fn panic_handlers() -> &'static Mutex<Vec<(HookId, FailureHandler)>> {
	PANIC_HANDLERS.get_or_init(|| Mutex::new(Vec::new()))
}

impl GlobalHooks for PanicHooks {
	fn install(&self, handler: FailureHandler) -> Result<HookId> {
		PANIC_DISPATCHER.get_or_init(|| {
			let previous = panic::take_hook();
			panic::set_hook(Box::new(move |info| {
				if !in_boundary() {
					let handlers: Vec<FailureHandler> = panic_handlers()
						.lock()
						.map(|h| h.iter().map(|(_, f)| Arc::clone(f)).collect())
						.unwrap_or_default();
					if !handlers.is_empty() {
						let captured = CapturedError::from_panic(
							info.payload(),
							info.location().map(|l| l.to_string()),
						);
						for handler in handlers {
							handler(captured.clone());
						}
					}
				}
				previous(info);
			}));
		});

		let id = HookId::next();
		panic_handlers()
			.lock()
			.map_err(|_| TelemetrySdkError::CaptureSetup("panic handler registry poisoned".into()))?
			.push((id, handler));
		Ok(id)
	}

	fn uninstall(&self, id: HookId) {
		let mut handlers = panic_handlers().lock().unwrap_or_else(|e| e.into_inner());
		handlers.retain(|(existing, _)| *existing != id);
	}
}

thread_local! {
	static BOUNDARY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as rendering inside an error boundary.
///
/// Panics raised while a scope is alive are reported by the boundary with
/// their component stack, so the global hook skips them.
pub(crate) struct BoundaryScope;

impl BoundaryScope {
	pub(crate) fn enter() -> Self {
		BOUNDARY_DEPTH.with(|d| d.set(d.get() + 1));
		BoundaryScope
	}
}

impl Drop for BoundaryScope {
	fn drop(&mut self) {
		BOUNDARY_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
	}
}

fn in_boundary() -> bool {
	BOUNDARY_DEPTH.with(|d| d.get() > 0)
}

/// Installation slots by project. Each slot holds the generation of the claim
/// that owns it, so a stale tracker cannot free a slot claimed after a reset.
static INSTALLED: OnceLock<Mutex<HashMap<ProjectId, u64>>> = OnceLock::new();
static NEXT_CLAIM: AtomicU64 = AtomicU64::new(1);

fn installed() -> &'static Mutex<HashMap<ProjectId, u64>> {
	INSTALLED.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Frees `project_id`'s slot if `generation` still owns it.
fn release_slot(project_id: &ProjectId, generation: u64) -> bool {
	let mut slots = installed().lock().unwrap_or_else(|e| e.into_inner());
	if slots.get(project_id) == Some(&generation) {
		slots.remove(project_id);
		true
	} else {
		false
	}
}

/// Whether global hooks are currently installed for `project_id`.
pub fn is_installed(project_id: &ProjectId) -> bool {
	installed()
		.lock()
		.map(|slots| slots.contains_key(project_id))
		.unwrap_or(false)
}

/// Forgets every installation. Test teardown only: hooks registered by live
/// trackers stay registered until their `cleanup`.
pub fn reset_installation_state() {
	installed()
		.lock()
		.unwrap_or_else(|e| e.into_inner())
		.clear();
}

/// Drops errors whose signature was already seen within the window.
#[derive(Debug)]
pub struct ErrorDeduplicator {
	window: Duration,
	seen: Mutex<HashMap<String, Instant>>,
}

impl ErrorDeduplicator {
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			seen: Mutex::new(HashMap::new()),
		}
	}

	/// Returns true if an error with `signature` should be reported now.
	pub fn should_report(&self, signature: &str) -> bool {
		self.should_report_at(signature, Instant::now())
	}

	pub fn should_report_at(&self, signature: &str, now: Instant) -> bool {
		let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
		let window = self.window;
		seen.retain(|_, at| now.saturating_duration_since(*at) < window);

		if seen.contains_key(signature) {
			return false;
		}
		seen.insert(signature.to_string(), now);
		true
	}
}

impl Default for ErrorDeduplicator {
	fn default() -> Self {
		Self::new(DEDUP_WINDOW)
	}
}

/// Outcome of a watched task that may count as a failure.
pub trait TaskOutcome: Send + 'static {
	fn failure(&self) -> Option<String>;
}

impl TaskOutcome for () {
	fn failure(&self) -> Option<String> {
		None
	}
}

impl<T: Send + 'static, E: Display + Send + 'static> TaskOutcome for std::result::Result<T, E> {
	fn failure(&self) -> Option<String> {
		self.as_ref().err().map(ToString::to_string)
	}
}

struct TrackerInner {
	client: TelemetryClient,
	issue_tracker_url: Option<String>,
	dedup: ErrorDeduplicator,
	hooks: Arc<dyn GlobalHooks>,
	registration: Mutex<Option<(HookId, u64)>>,
}

impl TrackerInner {
	fn report(&self, error: CapturedError, source: ErrorSource, component_stack: Option<&str>) {
		let client = &self.client;
		let record = ErrorRecord {
			message: error.message,
			stack_trace: error.stack_trace,
			source,
			error_type: error.type_name,
			url: client.current_url(),
			environment: client.environment().to_string(),
			component_stack: component_stack.map(str::to_string),
			browser_info: BrowserInfo::for_current_process(pulse_common_http::user_agent()),
			user_id: client.user_id(),
			session_id: client.session_id(),
			occurred_at: Utc::now(),
		};

		if !self.dedup.should_report(&record.signature()) {
			debug!(error.type = %record.error_type, "Suppressing duplicate error");
			return;
		}
		client.report_error_record(record);
	}

	fn release_hooks(&self) -> bool {
		let registration = self
			.registration
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.take();
		match registration {
			Some((id, generation)) => {
				self.hooks.uninstall(id);
				if !release_slot(self.client.project_id(), generation) {
					debug!(project.id = %self.client.project_id(), "Installation slot already reclaimed");
				}
				true
			}
			None => false,
		}
	}
}

impl Drop for TrackerInner {
	fn drop(&mut self) {
		self.release_hooks();
	}
}

/// Reporting capability returned by [`setup_client_error_tracking`].
///
/// All methods are infallible. A no-op tracker (returned when setup fails)
/// accepts every call and does nothing.
#[derive(Clone, Default)]
pub struct ErrorTracker {
	inner: Option<Arc<TrackerInner>>,
}

impl ErrorTracker {
	/// A tracker that ignores every call.
	pub fn noop() -> Self {
		Self { inner: None }
	}

	pub fn is_noop(&self) -> bool {
		self.inner.is_none()
	}

	/// Whether this tracker registered the global hooks.
	pub fn owns_hooks(&self) -> bool {
		self.inner.as_ref().is_some_and(|inner| {
			inner
				.registration
				.lock()
				.map(|r| r.is_some())
				.unwrap_or(false)
		})
	}

	/// Reports an error explicitly. `component_stack` is attached by error
	/// boundaries.
	pub fn report_error(&self, error: impl Into<CapturedError>, component_stack: Option<&str>) {
		if let Some(inner) = &self.inner {
			inner.report(error.into(), ErrorSource::Manual, component_stack);
		}
	}

	/// Reports an error that escaped application code.
	pub fn report_uncaught(&self, error: CapturedError) {
		if let Some(inner) = &self.inner {
			inner.report(error, ErrorSource::Uncaught, None);
		}
	}

	pub fn report_custom_event(&self, name: impl Into<String>, data: EventData) {
		if let Some(inner) = &self.inner {
			inner.client.report_event(name, data);
		}
	}

	pub fn report_page_view(&self, page: impl Into<String>, referrer: impl Into<String>) {
		if let Some(inner) = &self.inner {
			inner.client.report_page_view(page, referrer);
		}
	}

	/// Watches a spawned task and reports its failure as uncaught.
	///
	/// A task that panics, or whose `Result` output is an `Err`, is reported
	/// with type `UnhandledRejection`. Cancelled tasks are ignored.
	pub fn watch_task<T: TaskOutcome>(&self, handle: JoinHandle<T>) {
		let Some(inner) = &self.inner else {
			return;
		};
		let weak: Weak<TrackerInner> = Arc::downgrade(inner);

		inner.client.tasks().spawn_watcher("watch.task", async move {
			let failure = match handle.await {
				Ok(outcome) => outcome.failure(),
				Err(e) if e.is_panic() => Some(panic_message(e.into_panic().as_ref())),
				Err(_) => None,
			};
			if let (Some(message), Some(inner)) = (failure, weak.upgrade()) {
				inner.report(
					CapturedError::new(UNHANDLED_REJECTION, message),
					ErrorSource::Uncaught,
					None,
				);
			}
		});
	}

	/// Updates the user attached to later records.
	pub fn set_user_id(&self, user_id: Option<&str>) {
		if let Some(inner) = &self.inner {
			inner.client.set_user_id(user_id);
		}
	}

	/// Updates the location attached to later records.
	pub fn set_current_url(&self, url: impl Into<String>) {
		if let Some(inner) = &self.inner {
			inner.client.set_current_url(url);
		}
	}

	pub fn session_id(&self) -> Option<SessionId> {
		self.inner.as_ref().map(|inner| inner.client.session_id())
	}

	pub fn issue_tracker_url(&self) -> Option<String> {
		self.inner
			.as_ref()
			.and_then(|inner| inner.issue_tracker_url.clone())
	}

	/// Waits up to `timeout` for in-flight deliveries.
	pub async fn flush(&self, timeout: Duration) -> bool {
		match &self.inner {
			Some(inner) => inner.client.flush(timeout).await,
			None => true,
		}
	}

	/// Removes the global hooks if this tracker installed them.
	pub fn cleanup(&self) {
		if let Some(inner) = &self.inner {
			if inner.release_hooks() {
				info!(project.id = %inner.client.project_id(), "Error tracking hooks removed");
			}
		}
	}
}

/// Installs panic-hook error capture for `client`'s project.
pub fn setup_client_error_tracking(client: &TelemetryClient, config: TrackingConfig) -> ErrorTracker {
	setup_with_hooks(client, config, Arc::new(PanicHooks))
}

/// Like [`setup_client_error_tracking`] with an explicit hook implementation.
///
/// Hooks are registered only if no other live tracker holds the project's
/// installation slot. Any failure, including a panic, yields a no-op tracker.
pub fn setup_with_hooks(
	client: &TelemetryClient,
	config: TrackingConfig,
	hooks: Arc<dyn GlobalHooks>,
) -> ErrorTracker {
	match panic::catch_unwind(AssertUnwindSafe(|| try_setup(client, config, hooks))) {
		Ok(Ok(tracker)) => tracker,
		Ok(Err(e)) => {
			error!(error = %e, "Error tracking setup failed, continuing without it");
			ErrorTracker::noop()
		}
		Err(payload) => {
			error!(
				error = %panic_message(payload.as_ref()),
				"Error tracking setup panicked, continuing without it"
			);
			ErrorTracker::noop()
		}
	}
}

fn try_setup(
	client: &TelemetryClient,
	config: TrackingConfig,
	hooks: Arc<dyn GlobalHooks>,
) -> Result<ErrorTracker> {
	if let Some(user_id) = config.user_id.as_deref() {
		client.set_user_id(Some(user_id));
	}

	let inner = Arc::new(TrackerInner {
		client: client.clone(),
		issue_tracker_url: config.issue_tracker_url,
		dedup: ErrorDeduplicator::default(),
		hooks: Arc::clone(&hooks),
		registration: Mutex::new(None),
	});

	let Some(mut claim) = SlotClaim::acquire(client.project_id())? else {
		debug!(project.id = %client.project_id(), "Error tracking hooks already installed");
		return Ok(ErrorTracker { inner: Some(inner) });
	};

	let weak = Arc::downgrade(&inner);
	let handler: FailureHandler = Arc::new(move |captured| {
		if let Some(inner) = weak.upgrade() {
			inner.report(captured, ErrorSource::Uncaught, None);
		}
	});

	match hooks.install(handler) {
		Ok(id) => {
			let generation = claim.commit();
			*inner
				.registration
				.lock()
				.unwrap_or_else(|e| e.into_inner()) = Some((id, generation));
			info!(project.id = %client.project_id(), "Error tracking hooks installed");
			Ok(ErrorTracker { inner: Some(inner) })
		}
		Err(e) => {
			warn!(error = %e, "Failed to install error tracking hooks");
			Err(e)
		}
	}
}

/// A claimed installation slot, released on drop unless committed.
///
/// Releasing on drop also covers a hook implementation that panics.
struct SlotClaim<'a> {
	project_id: &'a ProjectId,
	generation: u64,
	committed: bool,
}

impl<'a> SlotClaim<'a> {
	fn acquire(project_id: &'a ProjectId) -> Result<Option<Self>> {
		let mut slots = installed()
			.lock()
			.map_err(|_| TelemetrySdkError::CaptureSetup("install registry poisoned".into()))?;
		if slots.contains_key(project_id) {
			return Ok(None);
		}
		let generation = NEXT_CLAIM.fetch_add(1, Ordering::SeqCst);
		slots.insert(project_id.clone(), generation);
		Ok(Some(Self {
			project_id,
			generation,
			committed: false,
		}))
	}

	/// Keeps the slot past this claim and returns its generation.
	fn commit(&mut self) -> u64 {
		self.committed = true;
		self.generation
	}
}

impl Drop for SlotClaim<'_> {
	fn drop(&mut self) {
		if !self.committed {
			release_slot(self.project_id, self.generation);
		}
	}
}
