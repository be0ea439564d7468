// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Inbound request bodies accepted by the gateway.
//!
//! These are deliberately more permissive than the records in
//! [`crate::record`]: browsers and older SDKs omit optional fields and send
//! timestamps either as unix milliseconds or RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::record::{BrowserInfo, ErrorSource};
use crate::value::EventData;

/// Body of `POST /telemetry/event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
	pub event_name: String,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub event_data: Option<EventData>,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub timestamp: Option<DateTime<Utc>>,
}

/// Body of `POST /telemetry/pageview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewRequest {
	pub page: String,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub referrer: Option<String>,
	#[serde(default)]
	pub user_agent: Option<String>,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub timestamp: Option<DateTime<Utc>>,
}

/// Body of `POST /telemetry/error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRequest {
	pub message: String,
	#[serde(default)]
	pub stack_trace: Option<String>,
	#[serde(default)]
	pub source: Option<ErrorSource>,
	#[serde(default, rename = "type")]
	pub error_type: Option<String>,
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub component_stack: Option<String>,
	#[serde(default)]
	pub browser_info: Option<BrowserInfo>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub occurred_at: Option<DateTime<Utc>>,
}

/// Body of `POST /telemetry/session/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartRequest {
	pub session_id: String,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub timestamp: Option<DateTime<Utc>>,
}

/// Body of `POST /telemetry/session/end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndRequest {
	pub session_id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
	Millis(i64),
	FractionalMillis(f64),
	Text(String),
}

/// Accepts `null`, unix milliseconds, or an RFC 3339 string.
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
	D: Deserializer<'de>,
{
	use serde::de::Error;

	let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
	match raw {
		None => Ok(None),
		Some(RawTimestamp::Millis(ms)) => DateTime::from_timestamp_millis(ms)
			.map(Some)
			.ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
		Some(RawTimestamp::FractionalMillis(ms)) => DateTime::from_timestamp_millis(ms as i64)
			.map(Some)
			.ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
		Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
			.map(|dt| Some(dt.with_timezone(&Utc)))
			.map_err(|e| D::Error::custom(format!("invalid timestamp {text:?}: {e}"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn event_request_requires_only_event_name() {
		let req: EventRequest =
			serde_json::from_value(json!({"eventName": "checkout_click", "sessionId": "s1"}))
				.unwrap();
		assert_eq!(req.event_name, "checkout_click");
		assert_eq!(req.session_id.as_deref(), Some("s1"));
		assert!(req.event_data.is_none());
		assert!(req.timestamp.is_none());
	}

	#[test]
	fn event_request_without_name_fails() {
		assert!(serde_json::from_value::<EventRequest>(json!({"sessionId": "s1"})).is_err());
	}

	#[test]
	fn timestamps_accept_millis_and_rfc3339() {
		let a: SessionStartRequest = serde_json::from_value(
			json!({"sessionId": "s1", "timestamp": 1_700_000_000_000i64}),
		)
		.unwrap();
		let b: SessionStartRequest = serde_json::from_value(
			json!({"sessionId": "s1", "timestamp": "2023-11-14T22:13:20Z"}),
		)
		.unwrap();
		assert_eq!(a.timestamp, b.timestamp);
		assert!(a.timestamp.is_some());
	}

	#[test]
	fn null_timestamp_is_absent() {
		let req: PageViewRequest =
			serde_json::from_value(json!({"page": "/", "timestamp": null})).unwrap();
		assert!(req.timestamp.is_none());
	}

	#[test]
	fn garbage_timestamp_is_rejected() {
		assert!(serde_json::from_value::<PageViewRequest>(
			json!({"page": "/", "timestamp": "yesterday"})
		)
		.is_err());
	}

	#[test]
	fn error_request_reads_type_field() {
		let req: ErrorRequest = serde_json::from_value(json!({
			"message": "boom",
			"type": "RangeError",
			"source": "uncaught",
			"componentStack": "at Panel",
		}))
		.unwrap();
		assert_eq!(req.error_type.as_deref(), Some("RangeError"));
		assert_eq!(req.source, Some(ErrorSource::Uncaught));
		assert_eq!(req.component_stack.as_deref(), Some("at Panel"));
	}
}
