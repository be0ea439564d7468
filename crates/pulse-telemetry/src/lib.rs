// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client SDK for Pulse telemetry.
//!
//! Captures uncaught failures (panics, failed background tasks), render
//! failures inside error boundaries, custom events and page views, ties each
//! of them to a session and user, and delivers them to the telemetry gateway.
//!
//! Reporting never fails from the caller's point of view: every delivery is a
//! detached task whose failure is only logged.
//!
//! # Example
//!
//! ```ignore
//! use pulse_telemetry::{TelemetryClient, TrackingConfig};
//!
//! let client = TelemetryClient::builder()
//!     .base_url("https://dashboard.example.com")
//!     .project_id("proj_xxx")
//!     .build()?;
//!
//! let tracker = client.setup_error_tracking(
//!     TrackingConfig::default().issue_tracker_url("https://issues.example.com/new"),
//! );
//! client.report_page_view("/dashboard", "");
//!
//! if let Err(e) = load_widgets().await {
//!     tracker.report_error(CapturedError::from_error(&e), None);
//! }
//! ```

pub mod boundary;
pub mod capture;
pub mod client;
pub mod error;
pub mod reporter;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use boundary::{
	BoundaryFailure, BoundaryState, Component, ErrorBoundary, Fallback, ReportErrors,
};
pub use capture::{
	is_installed, reset_installation_state, setup_client_error_tracking, setup_with_hooks,
	CapturedError, ErrorDeduplicator, ErrorTracker, FailureHandler, GlobalHooks, HookId,
	PanicHooks, TaskOutcome, TrackingConfig, DEDUP_WINDOW, UNHANDLED_REJECTION,
};
pub use client::{ClientConfig, TelemetryClient, TelemetryClientBuilder};
pub use error::{Result, TelemetrySdkError};
pub use reporter::EventReporter;
pub use session::{GatewaySessionApi, InMemorySessionIdStore, SessionIdProvider, SessionIdStore};
pub use transport::{HttpTransport, Transport};

pub use pulse_telemetry_core::{EventData, EventValue, SessionId};
