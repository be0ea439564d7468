// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP API of the session store.
//!
//! - `POST /api/sessions/start`
//! - `POST /api/sessions/end`
//! - `POST /api/sessions/signal`
//! - `GET /api/sessions`
//! - `GET /api/sessions/{session_id}`
//!
//! The project comes from the `x-project-id` header, or from the body's
//! `projectId` when the header is absent.

use std::sync::Arc;

use axum::{
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use chrono::{DateTime, Utc};
use pulse_common_http::{header_value, PROJECT_ID_HEADER};
use pulse_sessions_core::{normalize_user, EndSession, SignalKind, SignalRecord, StartSession};
use pulse_telemetry_core::{wire::lenient_timestamp, ProjectId, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::SessionsServerError;
use crate::repository::SessionsRepository;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct SessionsState {
	pub repository: Arc<dyn SessionsRepository>,
}

/// Builds the session store's routes.
pub fn router(repository: Arc<dyn SessionsRepository>) -> Router {
	Router::new()
		.route("/api/sessions", get(list_sessions))
		.route("/api/sessions/start", post(start_session))
		.route("/api/sessions/end", post(end_session))
		.route("/api/sessions/signal", post(record_signal))
		.route("/api/sessions/{session_id}", get(get_session))
		.with_state(SessionsState { repository })
}

// ============================================================================
// Error Response
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsErrorResponse {
	pub error: String,
	pub message: String,
}

impl IntoResponse for SessionsServerError {
	fn into_response(self) -> Response {
		let (status, error, message) = match &self {
			SessionsServerError::MissingField(_) | SessionsServerError::InvalidData(_) => {
				(StatusCode::BAD_REQUEST, "bad_request", self.to_string())
			}
			SessionsServerError::SessionNotFound(_) => {
				(StatusCode::NOT_FOUND, "not_found", self.to_string())
			}
			_ => {
				tracing::error!(error = %self, "Session store request failed");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"Internal error".to_string(),
				)
			}
		};
		(
			status,
			Json(SessionsErrorResponse {
				error: error.to_string(),
				message,
			}),
		)
			.into_response()
	}
}

type HandlerResult<T> = Result<T, SessionsServerError>;

fn resolve_project(headers: &HeaderMap, body_project: Option<&str>) -> HandlerResult<ProjectId> {
	header_value(headers, PROJECT_ID_HEADER)
		.as_deref()
		.or(body_project)
		.and_then(|p| ProjectId::parse(p).ok())
		.ok_or(SessionsServerError::MissingField("project id"))
}

fn parse_session_id(value: Option<&str>) -> HandlerResult<SessionId> {
	value
		.and_then(|s| SessionId::parse(s).ok())
		.ok_or(SessionsServerError::MissingField("session id"))
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionBody {
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub project_id: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionBody {
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub project_id: Option<String>,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBody {
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub project_id: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	pub kind: SignalKind,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionAck {
	pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
	pub limit: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip(state, headers, body))]
pub async fn start_session(
	State(state): State<SessionsState>,
	headers: HeaderMap,
	Json(body): Json<StartSessionBody>,
) -> HandlerResult<impl IntoResponse> {
	let project_id = resolve_project(&headers, body.project_id.as_deref())?;
	let session_id = parse_session_id(body.session_id.as_deref())?;

	let request = StartSession::new(session_id.clone(), project_id, body.user_id.as_deref())
		.at(body.timestamp.unwrap_or_else(Utc::now));
	state.repository.start_session(&request).await?;

	info!(
		project_id = %request.project_id,
		session_id = %session_id,
		user_id = %request.user_id,
		"Session upserted"
	);
	Ok((
		StatusCode::CREATED,
		Json(SessionAck {
			session_id: session_id.to_string(),
		}),
	))
}

#[instrument(skip(state, headers, body))]
pub async fn end_session(
	State(state): State<SessionsState>,
	headers: HeaderMap,
	Json(body): Json<EndSessionBody>,
) -> HandlerResult<impl IntoResponse> {
	let project_id = resolve_project(&headers, body.project_id.as_deref())?;
	let session_id = parse_session_id(body.session_id.as_deref())?;

	let mut request = EndSession::new(session_id.clone(), project_id);
	if let Some(timestamp) = body.timestamp {
		request.timestamp = timestamp;
	}
	state.repository.end_session(&request).await?;

	info!(project_id = %request.project_id, session_id = %session_id, "Session ended");
	Ok(Json(SessionAck {
		session_id: session_id.to_string(),
	}))
}

#[instrument(skip(state, headers, body))]
pub async fn record_signal(
	State(state): State<SessionsState>,
	headers: HeaderMap,
	Json(body): Json<SignalBody>,
) -> HandlerResult<impl IntoResponse> {
	let project_id = resolve_project(&headers, body.project_id.as_deref())?;
	let session_id = parse_session_id(body.session_id.as_deref())?;

	let signal = SignalRecord {
		session_id: session_id.clone(),
		project_id,
		user_id: normalize_user(body.user_id.as_deref()),
		kind: body.kind,
		timestamp: body.timestamp.unwrap_or_else(Utc::now),
	};
	state.repository.record_signal(&signal).await?;

	tracing::debug!(session_id = %session_id, kind = %signal.kind, "Signal recorded");
	Ok(Json(SessionAck {
		session_id: session_id.to_string(),
	}))
}

#[instrument(skip(state, headers))]
pub async fn get_session(
	State(state): State<SessionsState>,
	headers: HeaderMap,
	Path(session_id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
	let project_id = resolve_project(&headers, None)?;
	let session_id = parse_session_id(Some(&session_id))?;

	state
		.repository
		.get_session(&project_id, &session_id)
		.await?
		.map(Json)
		.ok_or_else(|| SessionsServerError::SessionNotFound(session_id.to_string()))
}

#[instrument(skip(state, headers))]
pub async fn list_sessions(
	State(state): State<SessionsState>,
	headers: HeaderMap,
	Query(query): Query<ListQuery>,
) -> HandlerResult<impl IntoResponse> {
	let project_id = resolve_project(&headers, None)?;
	let limit = query
		.limit
		.unwrap_or(DEFAULT_LIST_LIMIT)
		.clamp(1, MAX_LIST_LIMIT);

	let sessions = state.repository.list_sessions(&project_id, limit).await?;
	Ok(Json(sessions))
}
