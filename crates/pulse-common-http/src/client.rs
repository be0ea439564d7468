// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Upper bound on any single outbound forward.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
///
/// The timeout covers the whole request, connect included, so a hung peer
/// never holds a forward open longer than `timeout`.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder()
		.timeout(timeout)
		.connect_timeout(timeout)
		.build()
}

/// Returns the standard Pulse User-Agent string.
///
/// Format: `pulse/{version}/{os}-{arch}`
pub fn user_agent() -> String {
	format!(
		"pulse/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("pulse/"));
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "pulse");
	}

	#[test]
	fn client_with_timeout_builds() {
		assert!(new_client_with_timeout(DEFAULT_FORWARD_TIMEOUT).is_ok());
	}
}
