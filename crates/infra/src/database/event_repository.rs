//! Observed event repository implementation using SQLite
//!
//! Mirrors the calendar events seen for each user on the last poll.

use std::sync::Arc;

use async_trait::async_trait;
use chime_common::storage::SqliteConn;
use chime_core::store_ports::EventRepository as EventRepositoryPort;
use chime_domain::{ChimeError, ObservedEvent, Result as DomainResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row, ToSql};
use tokio::task;

use super::manager::DbManager;

const EVENT_COLUMNS: &str = "user_id, uid, title, starts_at, ends_at, location, alarm_at,
        last_seen_at";

/// SQLite-backed implementation of `EventRepository`
pub struct SqliteEventRepository {
    db: Arc<DbManager>,
}

impl SqliteEventRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventRepositoryPort for SqliteEventRepository {
    async fn upsert_event(&self, event: ObservedEvent) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_observed_event(&conn, &event)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_event(&self, user_id: &str, uid: &str) -> DomainResult<Option<ObservedEvent>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let uid = uid.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<ObservedEvent>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM observed_events WHERE user_id = ?1 AND uid = ?2"
                ),
                params![&user_id, &uid],
                map_event_row,
            );

            match result {
                Ok(event) => Ok(Some(event)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_upcoming_events(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> DomainResult<Vec<ObservedEvent>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let after_ts = after.timestamp();

        task::spawn_blocking(move || -> DomainResult<Vec<ObservedEvent>> {
            let conn = db.get_connection()?;

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM observed_events
                     WHERE user_id = ?1 AND starts_at > ?2
                     ORDER BY starts_at ASC"
                ))
                .map_err(map_sql_error)?;

            let rows = stmt
                .query_map(params![&user_id, after_ts], map_event_row)
                .map_err(map_sql_error)?;

            rows.collect::<rusqlite::Result<Vec<ObservedEvent>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_event(&self, user_id: &str, uid: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let uid = uid.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM observed_events WHERE user_id = ?1 AND uid = ?2",
                params![&user_id, &uid],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn purge_events_ending_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let cutoff_ts = cutoff.timestamp();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute("DELETE FROM observed_events WHERE ends_at < ?1", params![cutoff_ts])
                .map_err(map_sql_error)?;
            Ok(removed)
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to an ObservedEvent
fn map_event_row(row: &Row) -> rusqlite::Result<ObservedEvent> {
    Ok(ObservedEvent {
        user_id: row.get(0)?,
        uid: row.get(1)?,
        title: row.get(2)?,
        starts_at: row.get(3)?,
        ends_at: row.get(4)?,
        location: row.get(5)?,
        alarm_at: row.get(6)?,
        last_seen_at: row.get(7)?,
    })
}

/// Insert an observed event, or refresh it when the `(user_id, uid)` exists
fn upsert_observed_event(conn: &SqliteConn, event: &ObservedEvent) -> DomainResult<()> {
    let params: [&dyn ToSql; 8] = [
        &event.user_id,
        &event.uid,
        &event.title,
        &event.starts_at,
        &event.ends_at,
        &event.location,
        &event.alarm_at,
        &event.last_seen_at,
    ];

    conn.execute(
        "INSERT INTO observed_events (
            user_id, uid, title, starts_at, ends_at, location, alarm_at, last_seen_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id, uid) DO UPDATE SET
            title = excluded.title,
            starts_at = excluded.starts_at,
            ends_at = excluded.ends_at,
            location = excluded.location,
            alarm_at = excluded.alarm_at,
            last_seen_at = excluded.last_seen_at",
        params.as_slice(),
    )
    .map_err(map_sql_error)?;

    Ok(())
}

// =============================================================================
// Error Mapping
// =============================================================================

fn map_sql_error(err: rusqlite::Error) -> ChimeError {
    ChimeError::from(crate::errors::InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> ChimeError {
    ChimeError::Internal(format!("Task join error: {err}"))
}
