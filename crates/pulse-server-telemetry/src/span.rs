// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request trace spans.
//!
//! Each gateway request opens exactly one span through [`SpanCorrelator::start`].
//! The returned [`SpanGuard`] owns the span and closes it when dropped, so the
//! span is closed on every exit path, including a panicking handler. Closed
//! spans are handed to a [`SpanExporter`].

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, field, warn, Span};

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
	Unset,
	Ok,
	Error(String),
}

impl SpanStatus {
	pub fn is_error(&self) -> bool {
		matches!(self, Self::Error(_))
	}
}

impl Display for SpanStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unset => f.write_str("UNSET"),
			Self::Ok => f.write_str("OK"),
			Self::Error(message) => write!(f, "ERROR: {message}"),
		}
	}
}

/// A span after it has been closed.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
	pub name: &'static str,
	pub attributes: BTreeMap<String, String>,
	pub status: SpanStatus,
	pub duration: Duration,
}

impl FinishedSpan {
	pub fn attribute(&self, key: &str) -> Option<&str> {
		self.attributes.get(key).map(String::as_str)
	}
}

/// Receives every span exactly once, when it closes.
pub trait SpanExporter: Send + Sync {
	fn export(&self, span: FinishedSpan);
}

/// Writes finished spans to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpanExporter;

impl SpanExporter for LogSpanExporter {
	fn export(&self, span: FinishedSpan) {
		let duration_ms = span.duration.as_millis() as u64;
		match &span.status {
			SpanStatus::Error(message) => warn!(
				span.name = span.name,
				duration_ms,
				error = %message,
				attributes = ?span.attributes,
				"Span closed with error"
			),
			status => debug!(
				span.name = span.name,
				duration_ms,
				status = %status,
				attributes = ?span.attributes,
				"Span closed"
			),
		}
	}
}

/// Keeps finished spans in memory. Useful for tests and local inspection.
#[derive(Debug, Default, Clone)]
pub struct InMemorySpanExporter {
	spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl InMemorySpanExporter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn spans(&self) -> Vec<FinishedSpan> {
		self.spans.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn named(&self, name: &str) -> Vec<FinishedSpan> {
		self.spans()
			.into_iter()
			.filter(|span| span.name == name)
			.collect()
	}

	pub fn clear(&self) {
		self.spans.lock().unwrap_or_else(|e| e.into_inner()).clear();
	}
}

impl SpanExporter for InMemorySpanExporter {
	fn export(&self, span: FinishedSpan) {
		self.spans
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(span);
	}
}

struct SpanState {
	name: &'static str,
	attributes: BTreeMap<String, String>,
	status: SpanStatus,
	started: Instant,
	closed: bool,
}

/// Opens request spans and routes closed spans to an exporter.
#[derive(Clone)]
pub struct SpanCorrelator {
	exporter: Arc<dyn SpanExporter>,
}

impl SpanCorrelator {
	pub fn new(exporter: Arc<dyn SpanExporter>) -> Self {
		Self { exporter }
	}

	/// Correlator that only logs.
	pub fn logging() -> Self {
		Self::new(Arc::new(LogSpanExporter))
	}

	/// Opens a span. It closes when the returned guard is dropped.
	pub fn start(&self, name: &'static str) -> SpanGuard {
		let tracing_span = tracing::info_span!(
			"telemetry.request",
			otel.name = name,
			project.id = field::Empty,
			session.id = field::Empty,
			user.id = field::Empty,
			event.name = field::Empty,
			page = field::Empty,
			referrer = field::Empty,
			url = field::Empty,
			environment = field::Empty,
			error.id = field::Empty,
			error.message = field::Empty,
			error.source = field::Empty,
			"error.type" = field::Empty,
			otel.status_code = field::Empty,
			otel.status_message = field::Empty,
		);

		SpanGuard {
			handle: SpanHandle {
				state: Arc::new(Mutex::new(SpanState {
					name,
					attributes: BTreeMap::new(),
					status: SpanStatus::Unset,
					started: Instant::now(),
					closed: false,
				})),
				span: tracing_span,
			},
			exporter: Arc::clone(&self.exporter),
		}
	}
}

/// Shared access to an open span, for setting attributes and status.
///
/// Writes after the span has closed are ignored.
#[derive(Clone)]
pub struct SpanHandle {
	state: Arc<Mutex<SpanState>>,
	span: Span,
}

impl SpanHandle {
	pub fn set_attribute(&self, key: &'static str, value: impl Display) {
		let value = value.to_string();
		let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
		if state.closed {
			return;
		}
		self.span.record(key, value.as_str());
		state.attributes.insert(key.to_string(), value);
	}

	pub fn ok(&self) {
		self.set_status(SpanStatus::Ok);
	}

	pub fn error(&self, message: impl Into<String>) {
		self.set_status(SpanStatus::Error(message.into()));
	}

	pub fn status(&self) -> SpanStatus {
		self.state
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.status
			.clone()
	}

	fn set_status(&self, status: SpanStatus) {
		let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
		if !state.closed {
			state.status = status;
		}
	}
}

/// Owner of an open span. Dropping it closes the span exactly once.
pub struct SpanGuard {
	handle: SpanHandle,
	exporter: Arc<dyn SpanExporter>,
}

impl SpanGuard {
	pub fn handle(&self) -> SpanHandle {
		self.handle.clone()
	}

	pub fn tracing_span(&self) -> &Span {
		&self.handle.span
	}

	/// Closes the span now.
	pub fn end(self) {}
}

impl Drop for SpanGuard {
	fn drop(&mut self) {
		let finished = {
			let mut state = self.handle.state.lock().unwrap_or_else(|e| e.into_inner());
			if state.closed {
				return;
			}
			state.closed = true;
			if state.status == SpanStatus::Unset {
				state.status = if std::thread::panicking() {
					SpanStatus::Error("handler panicked".to_string())
				} else {
					SpanStatus::Error("request aborted before completion".to_string())
				};
			}
			FinishedSpan {
				name: state.name,
				attributes: std::mem::take(&mut state.attributes),
				status: state.status.clone(),
				duration: state.started.elapsed(),
			}
		};

		match &finished.status {
			SpanStatus::Error(message) => {
				self.handle.span.record("otel.status_code", "ERROR");
				self.handle
					.span
					.record("otel.status_message", message.as_str());
			}
			_ => {
				self.handle.span.record("otel.status_code", "OK");
			}
		}
		self.exporter.export(finished);
	}
}
