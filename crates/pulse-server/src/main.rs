// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pulse telemetry gateway binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pulse_server_config::{LogFormat, LoggingConfig};
use pulse_server_telemetry::SpanCorrelator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Pulse server - telemetry ingestion gateway.
#[derive(Parser, Debug)]
#[command(name = "pulse-server", about = "Pulse telemetry ingestion gateway", version)]
struct Args {
	/// Config file (defaults to /etc/pulse/server.toml)
	#[arg(long, env = "PULSE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the server (default)
	Serve,
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("pulse-server version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => pulse_server_config::load_config_with_file(path)?,
		None => pulse_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		backend = %config.backend.base_url,
		"starting pulse-server"
	);

	let app = pulse_server::build_app(&config, SpanCorrelator::logging()).await?;

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	if let Err(e) = axum::serve(listener, app.router)
		.with_graceful_shutdown(shutdown_signal())
		.await
	{
		tracing::error!(error = %e, "Server error");
	}

	tracing::info!("waiting for outstanding session calls");
	if !app.gateway.drain(SHUTDOWN_DRAIN_TIMEOUT).await {
		tracing::warn!(
			timeout_secs = SHUTDOWN_DRAIN_TIMEOUT.as_secs(),
			"session calls still pending at shutdown"
		);
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Received shutdown signal");
}
