// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side session identity and the gateway session API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pulse_sessions_core::{CallContext, EndSession, SessionApi, SessionsError, StartSession};
use pulse_telemetry_core::{SessionEndRequest, SessionId, SessionStartRequest};
use tracing::debug;

use crate::error::TelemetrySdkError;
use crate::transport::Transport;

pub(crate) const SESSION_START_PATH: &str = "/telemetry/session/start";
pub(crate) const SESSION_END_PATH: &str = "/telemetry/session/end";

/// Persistence for the current session id.
///
/// A browser keeps this in local storage; a native host might keep it in a
/// file or keychain. The SDK only needs load, store and clear.
pub trait SessionIdStore: Send + Sync {
	fn load(&self) -> Option<SessionId>;
	fn store(&self, session_id: &SessionId);
	fn clear(&self);
}

/// Process-lifetime [`SessionIdStore`].
#[derive(Debug, Default)]
pub struct InMemorySessionIdStore {
	current: Mutex<Option<SessionId>>,
}

impl InMemorySessionIdStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl SessionIdStore for InMemorySessionIdStore {
	fn load(&self) -> Option<SessionId> {
		self.current
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	fn store(&self, session_id: &SessionId) {
		*self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(session_id.clone());
	}

	fn clear(&self) {
		*self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
	}
}

/// Derives or reuses the session id for this client.
#[derive(Clone)]
pub struct SessionIdProvider {
	store: Arc<dyn SessionIdStore>,
	// Serializes generate-and-store so two threads never mint different ids.
	mint: Arc<Mutex<()>>,
}

impl SessionIdProvider {
	pub fn new(store: Arc<dyn SessionIdStore>) -> Self {
		Self {
			store,
			mint: Arc::new(Mutex::new(())),
		}
	}

	/// Returns the stored session id, generating and storing one if absent.
	pub fn current(&self) -> SessionId {
		if let Some(id) = self.store.load() {
			return id;
		}

		let _guard = self.mint.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(id) = self.store.load() {
			return id;
		}
		let id = SessionId::generate();
		self.store.store(&id);
		debug!(session.id = %id, "Generated new session id");
		id
	}

	/// Discards the current session id and returns a fresh one.
	pub fn rotate(&self) -> SessionId {
		let _guard = self.mint.lock().unwrap_or_else(|e| e.into_inner());
		self.store.clear();
		let id = SessionId::generate();
		self.store.store(&id);
		debug!(session.id = %id, "Rotated session id");
		id
	}
}

/// [`SessionApi`] implemented against the gateway's session endpoints.
pub struct GatewaySessionApi {
	transport: Arc<dyn Transport>,
}

impl GatewaySessionApi {
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self { transport }
	}

	async fn post<T: serde::Serialize + Sync>(
		&self,
		path: &str,
		ctx: &CallContext,
		body: &T,
	) -> pulse_sessions_core::Result<()> {
		let body = serde_json::to_value(body)?;
		self.transport
			.post(path, ctx, &body)
			.await
			.map(|_| ())
			.map_err(into_sessions_error)
	}
}

#[async_trait]
impl SessionApi for GatewaySessionApi {
	async fn start_session(
		&self,
		ctx: &CallContext,
		request: &StartSession,
	) -> pulse_sessions_core::Result<()> {
		let body = SessionStartRequest {
			session_id: request.session_id.to_string(),
			user_id: Some(request.user_id.clone()),
			timestamp: Some(request.timestamp),
		};
		self.post(SESSION_START_PATH, ctx, &body).await
	}

	async fn end_session(
		&self,
		ctx: &CallContext,
		request: &EndSession,
	) -> pulse_sessions_core::Result<()> {
		let body = SessionEndRequest {
			session_id: request.session_id.to_string(),
		};
		self.post(SESSION_END_PATH, ctx, &body).await
	}
}

fn into_sessions_error(error: TelemetrySdkError) -> SessionsError {
	match error {
		TelemetrySdkError::ServerError { status, message } => SessionsError::Rejected {
			status,
			body: message,
		},
		TelemetrySdkError::Rejected(message) => SessionsError::Rejected {
			status: 200,
			body: message,
		},
		TelemetrySdkError::RequestFailed(e) if e.is_timeout() => SessionsError::Timeout,
		TelemetrySdkError::SerializationError(e) => SessionsError::Serialization(e.to_string()),
		TelemetrySdkError::Session(e) => e,
		other => SessionsError::Unreachable(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::RecordingTransport;
	use pulse_telemetry_core::ProjectId;

	#[test]
	fn provider_reuses_stored_id() {
		let provider = SessionIdProvider::new(Arc::new(InMemorySessionIdStore::new()));
		let first = provider.current();
		assert_eq!(provider.current(), first);
		assert!(first.as_str().starts_with("session_"));
	}

	#[test]
	fn provider_respects_preexisting_id() {
		let store = Arc::new(InMemorySessionIdStore::new());
		store.store(&SessionId::parse("session_1_abcdefg").unwrap());
		let provider = SessionIdProvider::new(store);
		assert_eq!(provider.current().as_str(), "session_1_abcdefg");
	}

	#[test]
	fn rotate_replaces_id() {
		let provider = SessionIdProvider::new(Arc::new(InMemorySessionIdStore::new()));
		let first = provider.current();
		let second = provider.rotate();
		assert_ne!(first, second);
		assert_eq!(provider.current(), second);
	}

	#[test]
	fn concurrent_callers_share_one_id() {
		let provider = SessionIdProvider::new(Arc::new(InMemorySessionIdStore::new()));
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let provider = provider.clone();
				std::thread::spawn(move || provider.current())
			})
			.collect();
		let ids: Vec<SessionId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
		assert!(ids.windows(2).all(|w| w[0] == w[1]));
	}

	#[tokio::test]
	async fn gateway_api_posts_session_bodies() {
		let transport = Arc::new(RecordingTransport::new());
		let api = GatewaySessionApi::new(transport.clone());
		let ctx = CallContext::new(ProjectId::parse("p1").unwrap());
		let sid = SessionId::parse("s1").unwrap();

		api.start_session(&ctx, &StartSession::new(sid.clone(), ctx.project_id.clone(), None))
			.await
			.unwrap();
		api.end_session(&ctx, &EndSession::new(sid, ctx.project_id.clone()))
			.await
			.unwrap();

		let starts = transport.posts_to(SESSION_START_PATH);
		assert_eq!(starts.len(), 1);
		assert_eq!(starts[0].body["sessionId"], "s1");
		assert_eq!(starts[0].body["userId"], "anonymous");

		let ends = transport.posts_to(SESSION_END_PATH);
		assert_eq!(ends.len(), 1);
		assert_eq!(ends[0].body, serde_json::json!({"sessionId": "s1"}));
	}

	#[tokio::test]
	async fn gateway_failure_maps_to_rejected() {
		let transport = Arc::new(RecordingTransport::failing());
		let api = GatewaySessionApi::new(transport);
		let ctx = CallContext::new(ProjectId::parse("p1").unwrap());

		let err = api
			.end_session(
				&ctx,
				&EndSession::new(SessionId::parse("s1").unwrap(), ctx.project_id.clone()),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SessionsError::Rejected { status: 503, .. }));
	}
}
