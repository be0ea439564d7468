// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Pulse telemetry system.
//!
//! This crate provides the shared data model used by both the client SDK
//! (`pulse-telemetry`) and the ingestion gateway (`pulse-server-telemetry`):
//! - Error records, custom events and page views
//! - Project and session identifiers
//! - A closed JSON-compatible value type for arbitrary event data
//! - The uniform response envelope returned by every gateway endpoint
//! - Inbound wire payloads accepted by the gateway
//! - [`DetachedTasks`], the single place fire-and-forget work is spawned

pub mod detach;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod record;
pub mod value;
pub mod wire;

pub use detach::DetachedTasks;
pub use envelope::Envelope;
pub use error::{Result, TelemetryCoreError};
pub use ids::{
	ErrorId, MissingProjectPolicy, ProjectId, SessionId, ANONYMOUS_USER, UNSCOPED_PROJECT,
};
pub use record::{BrowserInfo, CustomEvent, ErrorRecord, ErrorSource, PageView};
pub use value::{EventData, EventValue};
pub use wire::{
	ErrorRequest, EventRequest, PageViewRequest, SessionEndRequest, SessionStartRequest,
};
