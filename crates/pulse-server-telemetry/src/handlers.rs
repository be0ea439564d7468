// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry ingestion handlers.
//!
//! Every endpoint follows the same sequence, implemented once in [`run`]:
//! open the request span, resolve the project, parse the body, do the
//! endpoint's work, then settle the span status and answer with the envelope.
//! The span guard is dropped last on every path.

use std::future::Future;

use axum::{
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use chrono::Utc;
use pulse_common_http::{cookie_header, header_value, ENVIRONMENT_HEADER};
use pulse_sessions_core::{normalize_user, CallContext, SignalKind, StartSession};
use pulse_telemetry_core::{
	Envelope, ErrorId, ErrorRequest, ErrorSource, EventData, EventRequest, PageViewRequest,
	SessionEndRequest, SessionId, SessionStartRequest,
};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn, Instrument};

use crate::error::GatewayError;
use crate::span::SpanHandle;
use crate::state::{GatewayState, SharedState};

pub const EVENT_SPAN: &str = "event.process";
pub const PAGEVIEW_SPAN: &str = "pageview.process";
pub const ERROR_SPAN: &str = "error.process";
pub const SESSION_START_SPAN: &str = "session.start";
pub const SESSION_END_SPAN: &str = "session.end";

const EVENT_FAILURE: &str = "Failed to process event";
const PAGEVIEW_FAILURE: &str = "Failed to process pageview";
const ERROR_FAILURE: &str = "Failed to process error";
const SESSION_START_FAILURE: &str = "Failed to start session";
const SESSION_END_FAILURE: &str = "Failed to end session";

const MAX_NAME_LENGTH: usize = 200;

fn validate_event_name(name: &str) -> Result<(), &'static str> {
	if name.trim().is_empty() {
		return Err("eventName cannot be empty");
	}
	if name.len() > MAX_NAME_LENGTH {
		return Err("eventName exceeds maximum length");
	}
	Ok(())
}

fn validate_page(page: &str) -> Result<(), &'static str> {
	if page.trim().is_empty() {
		return Err("page cannot be empty");
	}
	Ok(())
}

fn validate_error_message(message: &str) -> Result<(), &'static str> {
	if message.is_empty() {
		return Err("message cannot be empty");
	}
	Ok(())
}

async fn run<T, F, Fut>(
	state: &GatewayState,
	span_name: &'static str,
	failure_message: &'static str,
	headers: &HeaderMap,
	body: &[u8],
	handler: F,
) -> Response
where
	T: DeserializeOwned,
	F: FnOnce(CallContext, T, SpanHandle) -> Fut,
	Fut: Future<Output = Result<Envelope, GatewayError>>,
{
	let guard = state.spans.start(span_name);
	let span = guard.handle();
	let tracing_span = guard.tracing_span().clone();

	async move {
		let outcome: Result<Envelope, GatewayError> = async {
			let project_id = state.resolve_project(headers)?;
			span.set_attribute("project.id", &project_id);

			let payload: T = serde_json::from_slice(body)
				.map_err(|e| GatewayError::payload(failure_message, e))?;
			let ctx = CallContext::new(project_id).with_cookie(cookie_header(headers));
			handler(ctx, payload, span.clone()).await
		}
		.await;

		let response = match outcome {
			Ok(envelope) => {
				span.ok();
				(StatusCode::OK, Json(envelope)).into_response()
			}
			Err(e) => {
				match &e {
					GatewayError::MissingProjectId => {
						warn!(endpoint = span_name, "Rejected request without project id")
					}
					GatewayError::PayloadParse { reason, .. } => {
						error!(endpoint = span_name, error = %reason, "Failed to parse request payload")
					}
					_ => error!(endpoint = span_name, error = %e, "Backend call failed"),
				}
				span.error(e.to_string());
				e.into_response()
			}
		};
		guard.end();
		response
	}
	.instrument(tracing_span)
	.await
}

fn annotate_identity(span: &SpanHandle, session_id: Option<&SessionId>, user_id: Option<&str>) {
	if let Some(session_id) = session_id {
		span.set_attribute("session.id", session_id);
	}
	span.set_attribute("user.id", normalize_user(user_id));
}

/// POST /telemetry/event
pub async fn track_event(
	State(state): State<SharedState>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let gateway = state.as_ref();
	run(
		gateway,
		EVENT_SPAN,
		EVENT_FAILURE,
		&headers,
		&body,
		|ctx, request: EventRequest, span| async move {
			validate_event_name(&request.event_name)
				.map_err(|e| GatewayError::payload(EVENT_FAILURE, e))?;

			let session_id = SessionId::from_optional(request.session_id.as_deref());
			span.set_attribute("event.name", &request.event_name);
			annotate_identity(&span, session_id.as_ref(), request.user_id.as_deref());
			if let Some(url) = request.url.as_deref() {
				span.set_attribute("url", url);
			}

			info!(
				project.id = %ctx.project_id,
				event.name = %request.event_name,
				session.id = session_id.as_ref().map(SessionId::as_str),
				properties = request.event_data.as_ref().map_or(0, EventData::len),
				"Telemetry event received"
			);

			if let Some(session_id) = session_id {
				gateway.lifecycle.on_signal(
					ctx,
					session_id,
					request.user_id.as_deref(),
					Some(SignalKind::Event),
				);
			}
			Ok::<_, GatewayError>(Envelope::ok())
		},
	)
	.await
}

/// POST /telemetry/pageview
pub async fn track_page_view(
	State(state): State<SharedState>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let gateway = state.as_ref();
	run(
		gateway,
		PAGEVIEW_SPAN,
		PAGEVIEW_FAILURE,
		&headers,
		&body,
		|ctx, request: PageViewRequest, span| async move {
			validate_page(&request.page).map_err(|e| GatewayError::payload(PAGEVIEW_FAILURE, e))?;

			let session_id = SessionId::from_optional(request.session_id.as_deref());
			span.set_attribute("page", &request.page);
			annotate_identity(&span, session_id.as_ref(), request.user_id.as_deref());
			if let Some(referrer) = request.referrer.as_deref() {
				span.set_attribute("referrer", referrer);
			}

			info!(
				project.id = %ctx.project_id,
				page = %request.page,
				session.id = session_id.as_ref().map(SessionId::as_str),
				referrer = request.referrer.as_deref(),
				"Page view received"
			);

			if let Some(session_id) = session_id {
				gateway.lifecycle.on_signal(
					ctx,
					session_id,
					request.user_id.as_deref(),
					Some(SignalKind::PageView),
				);
			}
			Ok::<_, GatewayError>(Envelope::ok())
		},
	)
	.await
}

/// POST /telemetry/error
pub async fn track_error(
	State(state): State<SharedState>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let gateway = state.as_ref();
	let headers = &headers;
	run(
		gateway,
		ERROR_SPAN,
		ERROR_FAILURE,
		headers,
		&body,
		|ctx, request: ErrorRequest, span| async move {
			validate_error_message(&request.message)
				.map_err(|e| GatewayError::payload(ERROR_FAILURE, e))?;

			let error_id = ErrorId::new();
			let session_id = SessionId::from_optional(request.session_id.as_deref());
			let source = request.source.unwrap_or(ErrorSource::Manual);
			let error_type = request.error_type.as_deref().unwrap_or("Error");
			let environment = header_value(headers, ENVIRONMENT_HEADER)
				.or_else(|| request.environment.clone())
				.unwrap_or_else(|| gateway.config.environment.clone());

			span.set_attribute("error.id", error_id);
			span.set_attribute("error.message", &request.message);
			span.set_attribute("error.source", &source);
			span.set_attribute("error.type", error_type);
			span.set_attribute("environment", &environment);
			annotate_identity(&span, session_id.as_ref(), request.user_id.as_deref());
			if let Some(url) = request.url.as_deref() {
				span.set_attribute("url", url);
			}

			error!(
				error.id = %error_id,
				project.id = %ctx.project_id,
				error.message = %request.message,
				error.source = %source,
				error_type = %error_type,
				environment = %environment,
				session.id = session_id.as_ref().map(SessionId::as_str),
				user.id = %normalize_user(request.user_id.as_deref()),
				url = request.url.as_deref(),
				stack_trace = request.stack_trace.as_deref(),
				component_stack = request.component_stack.as_deref(),
				"Client error reported"
			);

			if let Some(session_id) = session_id {
				gateway.lifecycle.on_signal(
					ctx,
					session_id,
					request.user_id.as_deref(),
					Some(SignalKind::Error),
				);
			}
			Ok::<_, GatewayError>(Envelope::ok_with_error_id(error_id.to_string()))
		},
	)
	.await
}

/// POST /telemetry/session/start
pub async fn start_session(
	State(state): State<SharedState>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let gateway = state.as_ref();
	run(
		gateway,
		SESSION_START_SPAN,
		SESSION_START_FAILURE,
		&headers,
		&body,
		|ctx, request: SessionStartRequest, span| async move {
			let session_id = SessionId::parse(&request.session_id)
				.map_err(|e| GatewayError::payload(SESSION_START_FAILURE, e))?;
			annotate_identity(&span, Some(&session_id), request.user_id.as_deref());

			let start = StartSession::new(
				session_id.clone(),
				ctx.project_id.clone(),
				request.user_id.as_deref(),
			)
			.at(request.timestamp.unwrap_or_else(Utc::now));

			gateway
				.lifecycle
				.start_session(&ctx, &start)
				.await
				.map_err(|e| GatewayError::backend(SESSION_START_FAILURE, e))?;

			info!(
				project.id = %ctx.project_id,
				session.id = %session_id,
				user.id = %start.user_id,
				"Session started"
			);
			Ok::<_, GatewayError>(Envelope::ok_with_session(session_id.as_str()))
		},
	)
	.await
}

/// POST /telemetry/session/end
pub async fn end_session(
	State(state): State<SharedState>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let gateway = state.as_ref();
	run(
		gateway,
		SESSION_END_SPAN,
		SESSION_END_FAILURE,
		&headers,
		&body,
		|ctx, request: SessionEndRequest, span| async move {
			let session_id = SessionId::parse(&request.session_id)
				.map_err(|e| GatewayError::payload(SESSION_END_FAILURE, e))?;
			span.set_attribute("session.id", &session_id);

			gateway
				.lifecycle
				.end_session(&ctx, &session_id)
				.await
				.map_err(|e| GatewayError::backend(SESSION_END_FAILURE, e))?;

			info!(project.id = %ctx.project_id, session.id = %session_id, "Session ended");
			Ok::<_, GatewayError>(Envelope::ok())
		},
	)
	.await
}
