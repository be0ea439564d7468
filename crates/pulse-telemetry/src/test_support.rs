// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process transport used by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use pulse_sessions_core::CallContext;
use pulse_telemetry_core::Envelope;

use crate::error::{Result, TelemetrySdkError};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct RecordedPost {
	pub path: String,
	pub project_id: String,
	pub cookie: Option<String>,
	pub body: serde_json::Value,
}

pub struct RecordingTransport {
	posts: Mutex<Vec<RecordedPost>>,
	fail: AtomicBool,
}

impl RecordingTransport {
	pub fn new() -> Self {
		Self {
			posts: Mutex::new(Vec::new()),
			fail: AtomicBool::new(false),
		}
	}

	pub fn failing() -> Self {
		let transport = Self::new();
		transport.set_failing(true);
		transport
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn posts(&self) -> Vec<RecordedPost> {
		self.posts.lock().unwrap().clone()
	}

	pub fn posts_to(&self, path: &str) -> Vec<RecordedPost> {
		self.posts()
			.into_iter()
			.filter(|p| p.path == path)
			.collect()
	}
}

#[async_trait]
impl Transport for RecordingTransport {
	async fn post(
		&self,
		path: &str,
		ctx: &CallContext,
		body: &serde_json::Value,
	) -> Result<Envelope> {
		self.posts.lock().unwrap().push(RecordedPost {
			path: path.to_string(),
			project_id: ctx.project_id.to_string(),
			cookie: ctx.cookie.clone(),
			body: body.clone(),
		});

		if self.fail.load(Ordering::SeqCst) {
			return Err(TelemetrySdkError::ServerError {
				status: 503,
				message: "Service Unavailable".to_string(),
			});
		}

		match body.get("sessionId").and_then(|v| v.as_str()) {
			Some(session_id) if path.ends_with("/session/start") => {
				Ok(Envelope::ok_with_session(session_id))
			}
			_ => Ok(Envelope::ok()),
		}
	}
}
