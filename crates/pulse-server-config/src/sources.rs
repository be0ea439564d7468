// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::collections::HashMap;
use std::path::PathBuf;

use pulse_telemetry_core::MissingProjectPolicy;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	BackendConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer, SessionsStoreConfigLayer,
	TelemetryConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is skipped.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/pulse/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: PULSE_SERVER_<FIELD>
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn process() -> Self {
		Self { vars: None }
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self
			.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn u16(&self, name: &str) -> Result<Option<u16>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u16 value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn load_http(&self) -> Result<HttpConfigLayer, ConfigError> {
		Ok(HttpConfigLayer {
			host: self.var("PULSE_SERVER_HOST"),
			port: self.u16("PULSE_SERVER_PORT")?,
		})
	}

	fn load_backend(&self) -> Result<BackendConfigLayer, ConfigError> {
		Ok(BackendConfigLayer {
			base_url: self.var("PULSE_SERVER_BACKEND_URL"),
			forward_timeout_secs: self.u64("PULSE_SERVER_BACKEND_TIMEOUT_SECS")?,
		})
	}

	fn load_telemetry(&self) -> Result<TelemetryConfigLayer, ConfigError> {
		let missing_project_policy = match self.var("PULSE_SERVER_MISSING_PROJECT_POLICY") {
			Some(v) => Some(v.parse::<MissingProjectPolicy>().map_err(|e| {
				ConfigError::InvalidValue {
					key: "PULSE_SERVER_MISSING_PROJECT_POLICY".to_string(),
					message: e.to_string(),
				}
			})?),
			None => None,
		};

		Ok(TelemetryConfigLayer {
			environment: self.var("PULSE_SERVER_ENV"),
			default_project_id: self.var("PULSE_SERVER_DEFAULT_PROJECT_ID"),
			missing_project_policy,
		})
	}

	fn load_logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		let format = match self.var("PULSE_SERVER_LOG_FORMAT") {
			Some(v) if v.eq_ignore_ascii_case("json") => Some(LogFormat::Json),
			Some(v) if v.eq_ignore_ascii_case("pretty") => Some(LogFormat::Pretty),
			Some(v) => {
				return Err(ConfigError::InvalidValue {
					key: "PULSE_SERVER_LOG_FORMAT".to_string(),
					message: format!("expected 'pretty' or 'json', got '{v}'"),
				})
			}
			None => None,
		};

		Ok(LoggingConfigLayer {
			level: self.var("PULSE_SERVER_LOG_LEVEL"),
			format,
		})
	}

	fn load_sessions_store(&self) -> SessionsStoreConfigLayer {
		SessionsStoreConfigLayer {
			enabled: self.bool("PULSE_SERVER_SESSIONS_STORE_ENABLED"),
			database_url: self.var("PULSE_SERVER_SESSIONS_DATABASE_URL"),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(self.load_http()?),
			backend: Some(self.load_backend()?),
			telemetry: Some(self.load_telemetry()?),
			logging: Some(self.load_logging()?),
			sessions_store: Some(self.load_sessions_store()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_missing_toml_file_is_skipped() {
		let layer = TomlSource::new("/nonexistent/pulse/server.toml")
			.load()
			.unwrap();
		assert_eq!(layer, ServerConfigLayer::default());
	}

	#[test]
	fn test_toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
			[telemetry]
			environment = "staging"
			missing_project_policy = "passthrough"

			[sessions_store]
			enabled = true
			"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let telemetry = layer.telemetry.unwrap();
		assert_eq!(telemetry.environment.as_deref(), Some("staging"));
		assert_eq!(
			telemetry.missing_project_policy,
			Some(MissingProjectPolicy::Passthrough)
		);
		assert_eq!(layer.sessions_store.unwrap().enabled, Some(true));
	}

	#[test]
	fn test_malformed_toml_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[http\nport = 1").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_values_are_read() {
		let source = EnvSource::from_vars([
			("PULSE_SERVER_PORT", "9090"),
			("PULSE_SERVER_BACKEND_URL", "http://store:8081"),
			("PULSE_SERVER_MISSING_PROJECT_POLICY", "Passthrough"),
			("PULSE_SERVER_LOG_FORMAT", "json"),
			("PULSE_SERVER_SESSIONS_STORE_ENABLED", "1"),
			("PULSE_SERVER_ENV", ""),
		]);
		let layer = source.load().unwrap();

		assert_eq!(layer.http.unwrap().port, Some(9090));
		assert_eq!(
			layer.backend.unwrap().base_url.as_deref(),
			Some("http://store:8081")
		);
		let telemetry = layer.telemetry.unwrap();
		assert_eq!(
			telemetry.missing_project_policy,
			Some(MissingProjectPolicy::Passthrough)
		);
		assert_eq!(telemetry.environment, None);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
		assert_eq!(layer.sessions_store.unwrap().enabled, Some(true));
	}

	#[test]
	fn test_invalid_port_is_rejected() {
		let err = EnvSource::from_vars([("PULSE_SERVER_PORT", "http")])
			.load()
			.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PULSE_SERVER_PORT"));
	}

	#[test]
	fn test_invalid_policy_is_rejected() {
		let err = EnvSource::from_vars([("PULSE_SERVER_MISSING_PROJECT_POLICY", "ignore")])
			.load()
			.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}
}
