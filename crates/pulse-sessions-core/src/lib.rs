// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types and lifecycle for Pulse telemetry.
//!
//! Every captured signal (error, event, page view) belongs to a session. This
//! crate owns:
//! - The [`Session`] row shape kept by the backend store
//! - The payloads exchanged with the store's session API
//! - The [`SessionApi`] seam used to reach the store or the gateway
//! - [`SessionLifecycleClient`], which decides when a session is started,
//!   when a signal is counted and when a session is closed

pub mod api;
pub mod error;
pub mod lifecycle;
pub mod session;

pub use api::{CallContext, SessionApi};
pub use error::{Result, SessionsError};
pub use lifecycle::{SessionLifecycleClient, StartPolicy};
pub use session::{normalize_user, EndSession, Session, SignalKind, SignalRecord, StartSession};
