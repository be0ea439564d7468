// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use pulse_common_http::{header_value, DEFAULT_FORWARD_TIMEOUT, PROJECT_ID_HEADER};
use pulse_sessions_core::{SessionApi, SessionLifecycleClient, StartPolicy};
use pulse_telemetry_core::{DetachedTasks, MissingProjectPolicy, ProjectId};

use crate::error::GatewayError;
use crate::span::SpanCorrelator;

/// Gateway settings that affect request handling.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
	/// Environment recorded on errors that do not name one.
	pub environment: String,
	pub missing_project_policy: MissingProjectPolicy,
	/// Project used for header-less requests under the passthrough policy.
	pub default_project_id: Option<ProjectId>,
	/// Budget for each detached session call.
	pub forward_timeout: Duration,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			environment: "production".to_string(),
			missing_project_policy: MissingProjectPolicy::Reject,
			default_project_id: None,
			forward_timeout: DEFAULT_FORWARD_TIMEOUT,
		}
	}
}

/// State shared by all gateway handlers.
///
/// Handlers keep no per-request state here; the only shared pieces are the
/// backend session client, the span correlator and read-only config.
pub struct GatewayState {
	pub lifecycle: SessionLifecycleClient,
	pub spans: SpanCorrelator,
	pub config: GatewayConfig,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
	/// Builds the state. Must be called inside a tokio runtime so detached
	/// session calls have somewhere to run.
	pub fn new(backend: Arc<dyn SessionApi>, spans: SpanCorrelator, config: GatewayConfig) -> Self {
		let tasks = DetachedTasks::new(config.forward_timeout);
		Self {
			lifecycle: SessionLifecycleClient::new(backend, StartPolicy::EverySignal, tasks),
			spans,
			config,
		}
	}

	pub fn shared(self) -> SharedState {
		Arc::new(self)
	}

	pub fn resolve_project(&self, headers: &HeaderMap) -> Result<ProjectId, GatewayError> {
		let header = header_value(headers, PROJECT_ID_HEADER);
		self.config
			.missing_project_policy
			.resolve(header.as_deref(), self.config.default_project_id.as_ref())
			.map_err(|_| GatewayError::MissingProjectId)
	}

	/// Waits up to `timeout` for detached session calls to finish.
	pub async fn drain(&self, timeout: Duration) -> bool {
		self.lifecycle.drain(timeout).await
	}
}
