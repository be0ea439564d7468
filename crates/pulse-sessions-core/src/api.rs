// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The session API seam.
//!
//! The SDK implements [`SessionApi`] against the gateway's
//! `/telemetry/session/*` endpoints; the gateway implements it against the
//! backend store's `/api/sessions/*` endpoints.

use async_trait::async_trait;
use pulse_telemetry_core::ProjectId;

use crate::error::Result;
use crate::session::{EndSession, SignalRecord, StartSession};

/// Request-scoped data attached to every outbound session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
	pub project_id: ProjectId,
	/// Cookie string forwarded verbatim from the inbound request, if any.
	pub cookie: Option<String>,
}

impl CallContext {
	#[must_use]
	pub fn new(project_id: ProjectId) -> Self {
		Self {
			project_id,
			cookie: None,
		}
	}

	#[must_use]
	pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
		self.cookie = cookie.filter(|c| !c.is_empty());
		self
	}
}

/// Remote session operations.
///
/// Implementations must treat `start_session` as an upsert: repeated or
/// concurrent starts for the same session are safe.
#[async_trait]
pub trait SessionApi: Send + Sync {
	async fn start_session(&self, ctx: &CallContext, request: &StartSession) -> Result<()>;

	async fn end_session(&self, ctx: &CallContext, request: &EndSession) -> Result<()>;

	/// Counts one signal against the session. Remotes without signal
	/// counting accept and ignore it.
	async fn record_signal(&self, _ctx: &CallContext, _signal: &SignalRecord) -> Result<()> {
		Ok(())
	}
}
