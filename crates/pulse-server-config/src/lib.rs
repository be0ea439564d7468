// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Pulse server.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file and the environment
//! - Consistent environment variable naming (`PULSE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use pulse_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Gateway listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub backend: BackendConfig,
	pub telemetry: TelemetryConfig,
	pub logging: LoggingConfig,
	pub sessions_store: SessionsStoreConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`PULSE_SERVER_*`)
/// 2. Config file (`/etc/pulse/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::process()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::process()),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let backend = layer.backend.unwrap_or_default().finalize();
	let telemetry = layer.telemetry.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let sessions_store = layer.sessions_store.unwrap_or_default().finalize();

	let config = ServerConfig {
		http,
		backend,
		telemetry,
		logging,
		sessions_store,
	};
	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		backend = %config.backend.base_url,
		forward_timeout_secs = config.backend.forward_timeout_secs,
		environment = %config.telemetry.environment,
		missing_project_policy = %config.telemetry.missing_project_policy,
		sessions_store = config.sessions_store.enabled,
		"configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	let url = &config.backend.base_url;
	if !(url.starts_with("http://") || url.starts_with("https://")) {
		return Err(ConfigError::Validation(format!(
			"backend URL must start with http:// or https://, got '{url}'"
		)));
	}
	if config.backend.forward_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"backend forward timeout must be at least one second".to_string(),
		));
	}
	if config.sessions_store.enabled && config.sessions_store.database_url.trim().is_empty() {
		return Err(ConfigError::Validation(
			"sessions store is enabled but no database URL is set".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_telemetry_core::MissingProjectPolicy;
	use std::io::Write;

	fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
		load_config_from_sources(vec![
			Box::new(EnvSource::from_vars(vars.iter().copied())),
			Box::new(DefaultsSource),
		])
	}

	#[test]
	fn test_defaults() {
		let config = load(&[]).unwrap();
		assert_eq!(config, ServerConfig::default());
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
		assert_eq!(
			config.telemetry.missing_project_policy,
			MissingProjectPolicy::Reject
		);
	}

	#[test]
	fn test_env_overrides_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
			[http]
			host = "127.0.0.1"
			port = 7000
			"#
		)
		.unwrap();

		let config = load_config_from_sources(vec![
			Box::new(EnvSource::from_vars([("PULSE_SERVER_PORT", "7100")])),
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.socket_addr(), "127.0.0.1:7100");
	}

	#[test]
	fn test_default_project_is_parsed() {
		let config = load(&[
			("PULSE_SERVER_DEFAULT_PROJECT_ID", "web"),
			("PULSE_SERVER_MISSING_PROJECT_POLICY", "passthrough"),
		])
		.unwrap();
		assert_eq!(
			config.telemetry.default_project_id.map(|p| p.to_string()),
			Some("web".to_string())
		);
	}

	#[test]
	fn test_non_http_backend_is_rejected() {
		let err = load(&[("PULSE_SERVER_BACKEND_URL", "ftp://store")]).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_zero_timeout_is_rejected() {
		let err = load(&[("PULSE_SERVER_BACKEND_TIMEOUT_SECS", "0")]).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}
}
