// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	/// The config file exists but could not be read.
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The config file is not valid TOML for the expected layout.
	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// A single setting has a value that cannot be used.
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	/// Settings are individually valid but inconsistent.
	#[error("invalid configuration: {0}")]
	Validation(String),
}
