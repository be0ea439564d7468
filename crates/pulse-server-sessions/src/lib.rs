// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reference session store.
//!
//! Persists one row per `(project_id, session_id)` in SQLite and exposes the
//! backend session API the telemetry gateway forwards to. All writes are
//! order-independent upserts.

pub mod db;
pub mod error;
pub mod repository;
pub mod routes;

pub use db::{connect, create_pool, run_migrations};
pub use error::{Result, SessionsServerError};
pub use repository::{SessionsRepository, SqliteSessionsRepository};
pub use routes::{router, SessionsState};
