// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embedded reference session store.

use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "sqlite:./pulse-sessions.db";

/// When enabled, the server also serves the session store API on its own
/// listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionsStoreConfig {
	pub enabled: bool,
	pub database_url: String,
}

impl Default for SessionsStoreConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			database_url: DEFAULT_DATABASE_URL.to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SessionsStoreConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub database_url: Option<String>,
}

impl SessionsStoreConfigLayer {
	pub fn merge(&mut self, other: SessionsStoreConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.database_url.is_some() {
			self.database_url = other.database_url;
		}
	}

	pub fn finalize(self) -> SessionsStoreConfig {
		SessionsStoreConfig {
			enabled: self.enabled.unwrap_or(false),
			database_url: self
				.database_url
				.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
		}
	}
}
