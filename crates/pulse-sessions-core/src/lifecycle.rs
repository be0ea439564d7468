// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifecycle: when sessions are started, counted and closed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use pulse_telemetry_core::{DetachedTasks, ProjectId, SessionId};
use tracing::{debug, info, instrument, warn};

use crate::api::{CallContext, SessionApi};
use crate::error::Result;
use crate::session::{normalize_user, EndSession, SignalKind, SignalRecord, StartSession};

/// How often a best-effort session start is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
	/// One start attempt per session for the lifetime of this client, retried
	/// only if the previous attempt failed. Used by the SDK.
	OncePerSession,
	/// A start attempt alongside every signal. Used by the stateless gateway,
	/// which relies on the store's upsert.
	EverySignal,
}

struct Inner {
	api: Arc<dyn SessionApi>,
	policy: StartPolicy,
	started: Mutex<HashSet<(ProjectId, SessionId)>>,
	tasks: DetachedTasks,
}

impl Inner {
	/// Returns true if the caller should issue a start for this session.
	fn claim_start(&self, key: &(ProjectId, SessionId)) -> bool {
		match self.policy {
			StartPolicy::EverySignal => true,
			StartPolicy::OncePerSession => {
				let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
				started.insert(key.clone())
			}
		}
	}

	fn release_start(&self, key: &(ProjectId, SessionId)) {
		let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
		started.remove(key);
	}
}

/// Owns the decision of when a session must be created.
///
/// Signals trigger a detached, best-effort start (and optionally a signal
/// count) that never blocks or fails the signal itself. Ending a session is
/// awaited and its outcome returned, since it is the authoritative close.
#[derive(Clone)]
pub struct SessionLifecycleClient {
	inner: Arc<Inner>,
}

impl SessionLifecycleClient {
	pub fn new(api: Arc<dyn SessionApi>, policy: StartPolicy, tasks: DetachedTasks) -> Self {
		Self {
			inner: Arc::new(Inner {
				api,
				policy,
				started: Mutex::new(HashSet::new()),
				tasks,
			}),
		}
	}

	#[must_use]
	pub fn policy(&self) -> StartPolicy {
		self.inner.policy
	}

	#[must_use]
	pub fn tasks(&self) -> &DetachedTasks {
		&self.inner.tasks
	}

	/// Whether a start has been claimed for this session by this client.
	#[must_use]
	pub fn is_started(&self, project_id: &ProjectId, session_id: &SessionId) -> bool {
		let started = self.inner.started.lock().unwrap_or_else(|e| e.into_inner());
		started.contains(&(project_id.clone(), session_id.clone()))
	}

	/// Handles a signal that carries a session id.
	///
	/// Spawns a detached task that starts the session if the policy calls for
	/// it and then, if `kind` is given, counts the signal. Both calls are
	/// upserts on the remote. Returns whether the task was spawned.
	pub fn on_signal(
		&self,
		ctx: CallContext,
		session_id: SessionId,
		user_id: Option<&str>,
		kind: Option<SignalKind>,
	) -> bool {
		let key = (ctx.project_id.clone(), session_id.clone());
		let should_start = self.inner.claim_start(&key);
		if !should_start && kind.is_none() {
			return false;
		}

		let user_id = normalize_user(user_id);
		let inner = Arc::clone(&self.inner);
		let task_key = key.clone();

		let spawned = self.inner.tasks.spawn("session.sync", async move {
			let start_result = if should_start {
				let request = StartSession {
					session_id: session_id.clone(),
					project_id: ctx.project_id.clone(),
					user_id: user_id.clone(),
					timestamp: Utc::now(),
				};
				let result = inner.api.start_session(&ctx, &request).await;
				if result.is_err() && inner.policy == StartPolicy::OncePerSession {
					inner.release_start(&task_key);
				}
				result
			} else {
				Ok(())
			};

			let signal_result = match kind {
				Some(kind) => {
					let signal = SignalRecord {
						session_id,
						project_id: ctx.project_id.clone(),
						user_id,
						kind,
						timestamp: Utc::now(),
					};
					inner.api.record_signal(&ctx, &signal).await
				}
				None => Ok(()),
			};

			start_result.and(signal_result)
		});

		if !spawned && should_start {
			self.inner.release_start(&key);
		}
		spawned
	}

	/// Starts a session and waits for the remote to accept it.
	#[instrument(skip(self, ctx, request), fields(session.id = %request.session_id, project.id = %ctx.project_id))]
	pub async fn start_session(&self, ctx: &CallContext, request: &StartSession) -> Result<()> {
		self.inner.api.start_session(ctx, request).await?;
		// Stateless callers never consult the marker, so it is only kept when
		// later signals need it.
		if self.inner.policy == StartPolicy::OncePerSession {
			let mut started = self.inner.started.lock().unwrap_or_else(|e| e.into_inner());
			started.insert((request.project_id.clone(), request.session_id.clone()));
		}
		debug!("Session started");
		Ok(())
	}

	/// Ends a session and waits for the remote to accept it.
	///
	/// Errors are returned to the caller.
	#[instrument(skip(self, ctx), fields(session.id = %session_id, project.id = %ctx.project_id))]
	pub async fn end_session(&self, ctx: &CallContext, session_id: &SessionId) -> Result<()> {
		let request = EndSession::new(session_id.clone(), ctx.project_id.clone());
		match self.inner.api.end_session(ctx, &request).await {
			Ok(()) => {
				self.inner
					.release_start(&(ctx.project_id.clone(), session_id.clone()));
				info!("Session ended");
				Ok(())
			}
			Err(e) => {
				warn!(error = %e, "Failed to end session");
				Err(e)
			}
		}
	}

	/// Waits up to `timeout` for outstanding detached session calls.
	pub async fn drain(&self, timeout: Duration) -> bool {
		self.inner.tasks.drain(timeout).await
	}
}
