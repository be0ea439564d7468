// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry ingestion gateway.
//!
//! Receives errors, events, page views and session lifecycle calls from
//! clients, traces each request with exactly one span, and forwards session
//! state to the backend session store:
//! - `POST /telemetry/event`
//! - `POST /telemetry/pageview`
//! - `POST /telemetry/error`
//! - `POST /telemetry/session/start`
//! - `POST /telemetry/session/end`
//!
//! Signals never fail because of the session store; session start and end
//! calls do.

pub mod backend;
pub mod error;
pub mod handlers;
pub mod span;
pub mod state;

use axum::{routing::post, Router};

pub use backend::HttpSessionBackend;
pub use error::GatewayError;
pub use span::{
	FinishedSpan, InMemorySpanExporter, LogSpanExporter, SpanCorrelator, SpanExporter, SpanGuard,
	SpanHandle, SpanStatus,
};
pub use state::{GatewayConfig, GatewayState, SharedState};

/// Builds the gateway's routes.
pub fn router(state: SharedState) -> Router {
	Router::new()
		.route("/telemetry/event", post(handlers::track_event))
		.route("/telemetry/pageview", post(handlers::track_page_view))
		.route("/telemetry/error", post(handlers::track_error))
		.route("/telemetry/session/start", post(handlers::start_session))
		.route("/telemetry/session/end", post(handlers::end_session))
		.with_state(state)
}
