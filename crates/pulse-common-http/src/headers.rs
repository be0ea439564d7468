// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Header conventions shared by the SDK and the gateway.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::RequestBuilder;
use tracing::warn;

/// Header carrying the project identity on every telemetry request.
pub const PROJECT_ID_HEADER: &str = "x-project-id";

/// Optional header carrying the deployment environment label.
pub const ENVIRONMENT_HEADER: &str = "x-environment";

/// Attaches the JSON content type, the project identity and, when present,
/// the session cookie string to an outbound request.
///
/// The cookie string is forwarded verbatim.
pub fn forward_headers(
	request: RequestBuilder,
	project_id: &str,
	cookie: Option<&str>,
) -> RequestBuilder {
	let mut request = request
		.header(CONTENT_TYPE, "application/json")
		.header(PROJECT_ID_HEADER, project_id);

	if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
		match HeaderValue::from_str(cookie) {
			Ok(value) => request = request.header(COOKIE, value),
			Err(e) => warn!(error = %e, "Dropping cookie header with invalid characters"),
		}
	}

	request
}

/// Reads a header as a trimmed, non-empty string.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get(name)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
}

/// Returns the inbound `Cookie` header(s) joined as a single cookie string.
pub fn cookie_header(headers: &HeaderMap) -> Option<String> {
	let values: Vec<&str> = headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.filter(|s| !s.is_empty())
		.collect();

	if values.is_empty() {
		None
	} else {
		Some(values.join("; "))
	}
}
