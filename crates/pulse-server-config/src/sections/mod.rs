// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a partial `*Layer` used for merging and a
//! resolved config produced by `finalize`.

mod backend;
mod http;
mod logging;
mod sessions_store;
mod telemetry;

pub use backend::{BackendConfig, BackendConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use sessions_store::{SessionsStoreConfig, SessionsStoreConfigLayer};
pub use telemetry::{TelemetryConfig, TelemetryConfigLayer};
