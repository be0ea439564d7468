// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source.

use serde::Deserialize;

use crate::sections::{
	BackendConfigLayer, HttpConfigLayer, LoggingConfigLayer, SessionsStoreConfigLayer,
	TelemetryConfigLayer,
};

/// One source's view of the configuration. Unset sections and fields fall
/// through to lower precedence sources.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub backend: Option<BackendConfigLayer>,
	#[serde(default)]
	pub telemetry: Option<TelemetryConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub sessions_store: Option<SessionsStoreConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		match (&mut $self.$field, $other.$field) {
			(Some(existing), Some(incoming)) => existing.merge(incoming),
			(slot @ None, Some(incoming)) => *slot = Some(incoming),
			(_, None) => {}
		}
	};
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section!(self, other, http);
		merge_section!(self, other, backend);
		merge_section!(self, other, telemetry);
		merge_section!(self, other, logging);
		merge_section!(self, other, sessions_store);
	}
}
