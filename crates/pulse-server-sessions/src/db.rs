// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::error::{Result, SessionsServerError};

/// Create a SqlitePool with WAL mode and common settings.
///
/// In-memory databases get a single connection, since every SQLite
/// connection to `:memory:` opens its own database.
///
/// # Errors
/// Returns `SessionsServerError::Setup` if the URL is invalid, or a database
/// error if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
	let in_memory = database_url.contains(":memory:");
	let mut options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| SessionsServerError::Setup(format!("Invalid database URL: {e}")))?
		.create_if_missing(true);
	if !in_memory {
		options = options
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal);
	}

	let pool_options = if in_memory {
		SqlitePoolOptions::new().max_connections(1)
	} else {
		SqlitePoolOptions::new()
	};
	let pool = pool_options.connect_with(options).await?;

	tracing::debug!(in_memory, "database pool created");
	Ok(pool)
}

/// Creates the session table if it does not exist.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS telemetry_sessions (
			project_id TEXT NOT NULL,
			session_id TEXT NOT NULL,
			user_id TEXT NOT NULL,
			start_time TEXT NOT NULL,
			end_time TEXT,
			error_count INTEGER NOT NULL DEFAULT 0,
			event_count INTEGER NOT NULL DEFAULT 0,
			pageview_count INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			PRIMARY KEY (project_id, session_id)
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE INDEX IF NOT EXISTS idx_telemetry_sessions_project_start
			ON telemetry_sessions (project_id, start_time)
		"#,
	)
	.execute(pool)
	.await?;

	tracing::debug!("session store migrations applied");
	Ok(())
}

/// Opens a pool and applies migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
	let pool = create_pool(database_url).await?;
	run_migrations(&pool).await?;
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = connect("sqlite::memory:").await.unwrap();
		run_migrations(&pool).await.unwrap();

		let (count,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'telemetry_sessions'",
		)
		.fetch_one(&pool)
		.await
		.unwrap();
		assert_eq!(count, 1);
	}

	#[tokio::test]
	async fn file_database_is_created() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("sessions.db").display());
		let pool = connect(&url).await.unwrap();
		assert!(dir.path().join("sessions.db").exists());
		pool.close().await;
	}

	#[tokio::test]
	async fn invalid_url_is_setup_error() {
		let err = create_pool("sqlite:sessions.db?mode=sideways").await.unwrap_err();
		assert!(matches!(err, SessionsServerError::Setup(_)));
	}
}
