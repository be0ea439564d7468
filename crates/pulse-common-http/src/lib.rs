// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Pulse.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header and a
//!   bounded timeout for every outbound forward
//! - Helpers for attaching the project identity and session cookies to
//!   forwarded requests

mod client;
mod headers;

pub use client::{new_client_with_timeout, user_agent, DEFAULT_FORWARD_TIMEOUT};
pub use headers::{
	cookie_header, forward_headers, header_value, ENVIRONMENT_HEADER, PROJECT_ID_HEADER,
};
