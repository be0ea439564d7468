// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pulse server: wires the telemetry gateway, the optional embedded session
//! store and the health check into one router.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use pulse_server_config::ServerConfig;
use pulse_server_sessions::{SessionsRepository, SqliteSessionsRepository};
use pulse_server_telemetry::{
	GatewayConfig, GatewayState, HttpSessionBackend, SharedState, SpanCorrelator,
};
use serde_json::{json, Value};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};

/// Everything the binary needs to serve and shut down.
pub struct App {
	pub router: Router,
	pub gateway: SharedState,
}

pub async fn health() -> Json<Value> {
	Json(json!({"status": "ok"}))
}

pub fn gateway_config(config: &ServerConfig) -> GatewayConfig {
	GatewayConfig {
		environment: config.telemetry.environment.clone(),
		missing_project_policy: config.telemetry.missing_project_policy,
		default_project_id: config.telemetry.default_project_id.clone(),
		forward_timeout: config.backend.forward_timeout(),
	}
}

/// Assembles the full router. Session store routes are mounted only when a
/// repository is given.
pub fn create_router(
	gateway: SharedState,
	sessions: Option<Arc<dyn SessionsRepository>>,
) -> Router {
	let mut app = Router::new()
		.route("/health", get(health))
		.merge(pulse_server_telemetry::router(gateway));

	if let Some(repository) = sessions {
		app = app.merge(pulse_server_sessions::router(repository));
	}

	app.layer(TraceLayer::new_for_http()).layer(
		CorsLayer::new()
			.allow_origin(Any)
			.allow_methods(Any)
			.allow_headers(Any),
	)
}

/// Builds the gateway and, if enabled, opens the session store database.
pub async fn build_app(config: &ServerConfig, spans: SpanCorrelator) -> anyhow::Result<App> {
	let backend = HttpSessionBackend::new(&config.backend.base_url, config.backend.forward_timeout())?;
	let gateway = GatewayState::new(Arc::new(backend), spans, gateway_config(config)).shared();

	let sessions: Option<Arc<dyn SessionsRepository>> = if config.sessions_store.enabled {
		let pool = pulse_server_sessions::connect(&config.sessions_store.database_url).await?;
		tracing::info!(database = %config.sessions_store.database_url, "session store enabled");
		Some(Arc::new(SqliteSessionsRepository::new(pool)))
	} else {
		None
	};

	Ok(App {
		router: create_router(gateway.clone(), sessions),
		gateway,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use pulse_server_config::{load_config_from_sources, DefaultsSource, EnvSource};
	use pulse_server_telemetry::InMemorySpanExporter;
	use tower::ServiceExt;

	fn config(vars: &[(&str, &str)]) -> ServerConfig {
		load_config_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(EnvSource::from_vars(vars.iter().copied())),
		])
		.unwrap()
	}

	#[tokio::test]
	async fn health_reports_ok() {
		let app = build_app(
			&config(&[]),
			SpanCorrelator::new(Arc::new(InMemorySpanExporter::new())),
		)
		.await
		.unwrap();

		let response = app
			.router
			.oneshot(Request::get("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let body: Value = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(body, json!({"status": "ok"}));
	}

	#[tokio::test]
	async fn store_routes_absent_when_disabled() {
		let app = build_app(
			&config(&[]),
			SpanCorrelator::new(Arc::new(InMemorySpanExporter::new())),
		)
		.await
		.unwrap();

		let response = app
			.router
			.oneshot(
				Request::get("/api/sessions/s1")
					.header("x-project-id", "p1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn store_routes_mounted_when_enabled() {
		let app = build_app(
			&config(&[
				("PULSE_SERVER_SESSIONS_STORE_ENABLED", "true"),
				("PULSE_SERVER_SESSIONS_DATABASE_URL", "sqlite::memory:"),
			]),
			SpanCorrelator::new(Arc::new(InMemorySpanExporter::new())),
		)
		.await
		.unwrap();

		let response = app
			.router
			.oneshot(
				Request::get("/api/sessions")
					.header("x-project-id", "p1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[test]
	fn gateway_config_follows_server_config() {
		let config = config(&[
			("PULSE_SERVER_ENV", "staging"),
			("PULSE_SERVER_BACKEND_TIMEOUT_SECS", "2"),
		]);
		let gateway = gateway_config(&config);
		assert_eq!(gateway.environment, "staging");
		assert_eq!(gateway.forward_timeout, std::time::Duration::from_secs(2));
	}
}
