// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fire-and-forget task spawning.
//!
//! Every best-effort network call in the system (SDK deliveries, the gateway's
//! session side calls) goes through [`DetachedTasks::spawn`]. A detached task
//! is bounded by a timeout, its outcome is only ever logged, and outstanding
//! tasks can be drained on shutdown.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Tracks detached tasks and enforces a per-task time budget.
#[derive(Debug, Clone)]
pub struct DetachedTasks {
	tracker: TaskTracker,
	handle: Option<Handle>,
	budget: Duration,
}

impl DetachedTasks {
	/// Creates a tracker. If called inside a tokio runtime, that runtime is
	/// remembered so tasks can later be spawned from threads outside it.
	#[must_use]
	pub fn new(budget: Duration) -> Self {
		Self {
			tracker: TaskTracker::new(),
			handle: Handle::try_current().ok(),
			budget,
		}
	}

	/// Creates a tracker bound to an explicit runtime.
	#[must_use]
	pub fn with_handle(budget: Duration, handle: Handle) -> Self {
		Self {
			tracker: TaskTracker::new(),
			handle: Some(handle),
			budget,
		}
	}

	#[must_use]
	pub fn budget(&self) -> Duration {
		self.budget
	}

	/// Spawns `task` detached from the caller.
	///
	/// Failures and timeouts are logged at warn level under `label` and then
	/// dropped. Returns `false` when no runtime is available, in which case the
	/// task is dropped without running.
	pub fn spawn<F, E>(&self, label: &'static str, task: F) -> bool
	where
		F: Future<Output = Result<(), E>> + Send + 'static,
		E: Display + Send + 'static,
	{
		let handle = match Handle::try_current().ok().or_else(|| self.handle.clone()) {
			Some(handle) => handle,
			None => {
				warn!(task = label, "No async runtime available, dropping detached task");
				return false;
			}
		};

		let budget = self.budget;
		self.tracker.spawn_on(
			async move {
				match tokio::time::timeout(budget, task).await {
					Ok(Ok(())) => debug!(task = label, "Detached task completed"),
					Ok(Err(e)) => warn!(task = label, error = %e, "Detached task failed"),
					Err(_) => warn!(
						task = label,
						timeout_ms = budget.as_millis() as u64,
						"Detached task timed out"
					),
				}
			},
			&handle,
		);
		true
	}

	/// Spawns a long-lived watcher that is neither time-bounded nor waited
	/// for by [`drain`](Self::drain). The watcher must do its own logging.
	pub fn spawn_watcher<F>(&self, label: &'static str, task: F) -> bool
	where
		F: Future<Output = ()> + Send + 'static,
	{
		match Handle::try_current().ok().or_else(|| self.handle.clone()) {
			Some(handle) => {
				handle.spawn(task);
				true
			}
			None => {
				warn!(task = label, "No async runtime available, dropping watcher");
				false
			}
		}
	}

	/// Number of detached tasks still running.
	#[must_use]
	pub fn in_flight(&self) -> usize {
		self.tracker.len()
	}

	/// Waits up to `timeout` for every outstanding task to finish.
	///
	/// Returns `true` if all tasks finished. The tracker stays usable afterwards.
	pub async fn drain(&self, timeout: Duration) -> bool {
		self.tracker.close();
		let finished = tokio::time::timeout(timeout, self.tracker.wait())
			.await
			.is_ok();
		self.tracker.reopen();
		if !finished {
			warn!(
				remaining = self.tracker.len(),
				"Detached tasks still running after drain timeout"
			);
		}
		finished
	}
}
