// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository layer for session records.
//!
//! Every write is a single upsert keyed by `(project_id, session_id)`, so
//! starts, signals and ends may arrive in any order, concurrently or more than
//! once:
//! - a start never resets counters and never reopens an ended session
//! - a signal creates the session if needed and adds to one counter
//! - the first end wins; an end for an unknown session records a closed row

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pulse_sessions_core::{EndSession, Session, SignalKind, SignalRecord, StartSession};
use pulse_telemetry_core::{ProjectId, SessionId, ANONYMOUS_USER};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{Result, SessionsServerError};

#[async_trait]
pub trait SessionsRepository: Send + Sync {
	async fn start_session(&self, request: &StartSession) -> Result<()>;
	async fn record_signal(&self, signal: &SignalRecord) -> Result<()>;
	async fn end_session(&self, request: &EndSession) -> Result<()>;
	async fn get_session(
		&self,
		project_id: &ProjectId,
		session_id: &SessionId,
	) -> Result<Option<Session>>;
	async fn list_sessions(&self, project_id: &ProjectId, limit: u32) -> Result<Vec<Session>>;
}

/// SQLite implementation of the sessions repository.
#[derive(Clone)]
pub struct SqliteSessionsRepository {
	pool: SqlitePool,
}

impl SqliteSessionsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

// Fixed-width timestamps so that SQL MIN() over TEXT orders chronologically.
fn timestamp(dt: &DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| SessionsServerError::InvalidData(format!("invalid {field}: {e}")))
}

#[derive(sqlx::FromRow)]
struct SessionRow {
	project_id: String,
	session_id: String,
	user_id: String,
	start_time: String,
	end_time: Option<String>,
	error_count: i64,
	event_count: i64,
	pageview_count: i64,
}

impl TryFrom<SessionRow> for Session {
	type Error = SessionsServerError;

	fn try_from(row: SessionRow) -> Result<Self> {
		Ok(Session {
			session_id: SessionId::parse(&row.session_id)
				.map_err(|_| SessionsServerError::InvalidData("invalid session ID".into()))?,
			project_id: ProjectId::parse(&row.project_id)
				.map_err(|_| SessionsServerError::InvalidData("invalid project ID".into()))?,
			user_id: row.user_id,
			start_time: parse_timestamp(&row.start_time, "start_time")?,
			end_time: row
				.end_time
				.as_deref()
				.map(|s| parse_timestamp(s, "end_time"))
				.transpose()?,
			error_count: row.error_count as u32,
			event_count: row.event_count as u32,
			pageview_count: row.pageview_count as u32,
		})
	}
}

const SESSION_COLUMNS: &str = "project_id, session_id, user_id, start_time, end_time, \
	error_count, event_count, pageview_count";

#[async_trait]
impl SessionsRepository for SqliteSessionsRepository {
	#[instrument(skip(self, request), fields(session_id = %request.session_id, project_id = %request.project_id))]
	async fn start_session(&self, request: &StartSession) -> Result<()> {
		let now = timestamp(&Utc::now());
		sqlx::query(
			r#"
			INSERT INTO telemetry_sessions (
				project_id, session_id, user_id, start_time, end_time,
				error_count, event_count, pageview_count,
				created_at, updated_at
			)
			VALUES (?, ?, ?, ?, NULL, 0, 0, 0, ?, ?)
			ON CONFLICT(project_id, session_id) DO UPDATE SET
				user_id = CASE
					WHEN telemetry_sessions.user_id = ? THEN excluded.user_id
					ELSE telemetry_sessions.user_id
				END,
				start_time = MIN(telemetry_sessions.start_time, excluded.start_time),
				updated_at = excluded.updated_at
			"#,
		)
		.bind(request.project_id.as_str())
		.bind(request.session_id.as_str())
		.bind(&request.user_id)
		.bind(timestamp(&request.timestamp))
		.bind(&now)
		.bind(&now)
		.bind(ANONYMOUS_USER)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self, signal), fields(session_id = %signal.session_id, kind = %signal.kind))]
	async fn record_signal(&self, signal: &SignalRecord) -> Result<()> {
		let now = timestamp(&Utc::now());
		let increment = |kind: SignalKind| i64::from(signal.kind == kind);
		sqlx::query(
			r#"
			INSERT INTO telemetry_sessions (
				project_id, session_id, user_id, start_time, end_time,
				error_count, event_count, pageview_count,
				created_at, updated_at
			)
			VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?, ?)
			ON CONFLICT(project_id, session_id) DO UPDATE SET
				user_id = CASE
					WHEN telemetry_sessions.user_id = ? THEN excluded.user_id
					ELSE telemetry_sessions.user_id
				END,
				start_time = MIN(telemetry_sessions.start_time, excluded.start_time),
				error_count = telemetry_sessions.error_count + excluded.error_count,
				event_count = telemetry_sessions.event_count + excluded.event_count,
				pageview_count = telemetry_sessions.pageview_count + excluded.pageview_count,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(signal.project_id.as_str())
		.bind(signal.session_id.as_str())
		.bind(&signal.user_id)
		.bind(timestamp(&signal.timestamp))
		.bind(increment(SignalKind::Error))
		.bind(increment(SignalKind::Event))
		.bind(increment(SignalKind::PageView))
		.bind(&now)
		.bind(&now)
		.bind(ANONYMOUS_USER)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self, request), fields(session_id = %request.session_id, project_id = %request.project_id))]
	async fn end_session(&self, request: &EndSession) -> Result<()> {
		let now = timestamp(&Utc::now());
		let ended_at = timestamp(&request.timestamp);
		sqlx::query(
			r#"
			INSERT INTO telemetry_sessions (
				project_id, session_id, user_id, start_time, end_time,
				error_count, event_count, pageview_count,
				created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, 0, 0, 0, ?, ?)
			ON CONFLICT(project_id, session_id) DO UPDATE SET
				end_time = COALESCE(telemetry_sessions.end_time, excluded.end_time),
				updated_at = excluded.updated_at
			"#,
		)
		.bind(request.project_id.as_str())
		.bind(request.session_id.as_str())
		.bind(ANONYMOUS_USER)
		.bind(&ended_at)
		.bind(&ended_at)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(session_id = %session_id, project_id = %project_id))]
	async fn get_session(
		&self,
		project_id: &ProjectId,
		session_id: &SessionId,
	) -> Result<Option<Session>> {
		let row = sqlx::query_as::<_, SessionRow>(&format!(
			"SELECT {SESSION_COLUMNS} FROM telemetry_sessions WHERE project_id = ? AND session_id = ?"
		))
		.bind(project_id.as_str())
		.bind(session_id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(Session::try_from).transpose()
	}

	#[instrument(skip(self), fields(project_id = %project_id))]
	async fn list_sessions(&self, project_id: &ProjectId, limit: u32) -> Result<Vec<Session>> {
		let rows = sqlx::query_as::<_, SessionRow>(&format!(
			"SELECT {SESSION_COLUMNS} FROM telemetry_sessions WHERE project_id = ? \
			 ORDER BY start_time DESC LIMIT ?"
		))
		.bind(project_id.as_str())
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Session::try_from).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db;
	use chrono::Duration;
	use proptest::prelude::*;

	async fn repo() -> SqliteSessionsRepository {
		SqliteSessionsRepository::new(db::connect("sqlite::memory:").await.unwrap())
	}

	fn pid(s: &str) -> ProjectId {
		ProjectId::parse(s).unwrap()
	}

	fn sid(s: &str) -> SessionId {
		SessionId::parse(s).unwrap()
	}

	fn signal(session: &str, kind: SignalKind, user: &str) -> SignalRecord {
		SignalRecord {
			session_id: sid(session),
			project_id: pid("p1"),
			user_id: user.to_string(),
			kind,
			timestamp: Utc::now(),
		}
	}

	#[tokio::test]
	async fn start_creates_open_session() {
		let repo = repo().await;
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), Some("u1")))
			.await
			.unwrap();

		let session = repo.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
		assert_eq!(session.user_id, "u1");
		assert!(!session.is_ended());
		assert_eq!(session.pageview_count, 0);
	}

	#[tokio::test]
	async fn repeated_start_keeps_counts_and_earliest_start() {
		let repo = repo().await;
		let early = Utc::now() - Duration::minutes(5);
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), None).at(early))
			.await
			.unwrap();
		repo.record_signal(&signal("s1", SignalKind::PageView, "anonymous"))
			.await
			.unwrap();
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), Some("u1")))
			.await
			.unwrap();

		let session = repo.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
		assert_eq!(session.pageview_count, 1);
		assert_eq!(session.user_id, "u1");
		assert_eq!(
			session.start_time.timestamp_millis(),
			early.timestamp_millis()
		);
	}

	#[tokio::test]
	async fn identified_user_is_not_overwritten() {
		let repo = repo().await;
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), Some("u1")))
			.await
			.unwrap();
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), Some("u2")))
			.await
			.unwrap();
		repo.record_signal(&signal("s1", SignalKind::Event, "anonymous"))
			.await
			.unwrap();

		let session = repo.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
		assert_eq!(session.user_id, "u1");
	}

	#[tokio::test]
	async fn signals_increment_their_counter() {
		let repo = repo().await;
		for kind in [
			SignalKind::Error,
			SignalKind::Event,
			SignalKind::Event,
			SignalKind::PageView,
		] {
			repo.record_signal(&signal("s1", kind, "u1")).await.unwrap();
		}

		let session = repo.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
		assert_eq!(session.error_count, 1);
		assert_eq!(session.event_count, 2);
		assert_eq!(session.pageview_count, 1);
	}

	#[tokio::test]
	async fn first_end_wins_and_start_does_not_reopen() {
		let repo = repo().await;
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), None))
			.await
			.unwrap();

		let first = EndSession::new(sid("s1"), pid("p1"));
		repo.end_session(&first).await.unwrap();
		let mut second = EndSession::new(sid("s1"), pid("p1"));
		second.timestamp = first.timestamp + Duration::minutes(10);
		repo.end_session(&second).await.unwrap();

		// A late start from a detached side call.
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), None))
			.await
			.unwrap();

		let session = repo.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
		assert_eq!(
			session.end_time.map(|t| t.timestamp_millis()),
			Some(first.timestamp.timestamp_millis())
		);
	}

	#[tokio::test]
	async fn end_without_start_records_closed_session() {
		let repo = repo().await;
		repo.end_session(&EndSession::new(sid("ghost"), pid("p1")))
			.await
			.unwrap();

		let session = repo
			.get_session(&pid("p1"), &sid("ghost"))
			.await
			.unwrap()
			.unwrap();
		assert!(session.is_ended());
		assert_eq!(session.user_id, ANONYMOUS_USER);
	}

	#[tokio::test]
	async fn sessions_are_scoped_by_project() {
		let repo = repo().await;
		repo.start_session(&StartSession::new(sid("s1"), pid("p1"), None))
			.await
			.unwrap();

		assert!(repo.get_session(&pid("p2"), &sid("s1")).await.unwrap().is_none());
		repo.start_session(&StartSession::new(sid("s1"), pid("p2"), None))
			.await
			.unwrap();
		assert_eq!(repo.list_sessions(&pid("p1"), 10).await.unwrap().len(), 1);
		assert_eq!(repo.list_sessions(&pid("p2"), 10).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn concurrent_starts_produce_one_row() {
		let repo = repo().await;
		let start = StartSession::new(sid("s1"), pid("p1"), Some("u1"));
		let (a, b) = tokio::join!(repo.start_session(&start), repo.start_session(&start));
		a.unwrap();
		b.unwrap();
		repo.record_signal(&signal("s1", SignalKind::Event, "u1"))
			.await
			.unwrap();

		let sessions = repo.list_sessions(&pid("p1"), 10).await.unwrap();
		assert_eq!(sessions.len(), 1);
		assert_eq!(sessions[0].event_count, 1);
	}

	#[tokio::test]
	async fn list_is_newest_first_and_limited() {
		let repo = repo().await;
		let base = Utc::now();
		for (i, name) in ["a", "b", "c"].iter().enumerate() {
			repo.start_session(
				&StartSession::new(sid(name), pid("p1"), None).at(base + Duration::seconds(i as i64)),
			)
			.await
			.unwrap();
		}

		let sessions = repo.list_sessions(&pid("p1"), 2).await.unwrap();
		let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
		assert_eq!(ids, vec!["c", "b"]);
	}

	fn kind_strategy() -> impl Strategy<Value = SignalKind> {
		prop_oneof![
			Just(SignalKind::Error),
			Just(SignalKind::Event),
			Just(SignalKind::PageView),
		]
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(32))]

		#[test]
		fn counters_do_not_depend_on_arrival_order(
			kinds in proptest::collection::vec(kind_strategy(), 0..12),
			start_first in any::<bool>(),
		) {
			let runtime = tokio::runtime::Builder::new_current_thread()
				.enable_all()
				.build()
				.unwrap();
			runtime.block_on(async {
				let forward = repo().await;
				let backward = repo().await;
				let start = StartSession::new(sid("s1"), pid("p1"), Some("u1"));

				if start_first {
					forward.start_session(&start).await.unwrap();
				}
				for kind in &kinds {
					forward.record_signal(&signal("s1", *kind, "u1")).await.unwrap();
				}
				if !start_first {
					forward.start_session(&start).await.unwrap();
				}

				for kind in kinds.iter().rev() {
					backward.record_signal(&signal("s1", *kind, "u1")).await.unwrap();
				}
				backward.start_session(&start).await.unwrap();

				let a = forward.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
				let b = backward.get_session(&pid("p1"), &sid("s1")).await.unwrap().unwrap();
				for kind in [SignalKind::Error, SignalKind::Event, SignalKind::PageView] {
					prop_assert_eq!(a.count_for(kind), b.count_for(kind));
					let expected = kinds.iter().filter(|k| **k == kind).count() as u32;
					prop_assert_eq!(a.count_for(kind), expected);
				}
				Ok(())
			})?;
		}
	}
}
