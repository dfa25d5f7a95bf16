//! Reminder record repository implementation using SQLite
//!
//! Owns every status transition of the reminder lifecycle. Each transition
//! is a single guarded UPDATE so concurrent ticks and webhook callbacks
//! race on the database, not in application code: whichever statement runs
//! first wins, the loser sees zero affected rows.

use std::sync::Arc;

use async_trait::async_trait;
use chime_common::storage::SqliteConn;
use chime_core::store_ports::ReminderRepository as ReminderRepositoryPort;
use chime_domain::{ChimeError, ReminderRecord, ReminderStatus, Result as DomainResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row, ToSql};
use tokio::task;
use tracing::instrument;

use super::manager::DbManager;

const RECORD_COLUMNS: &str = "user_id, event_uid, fire_at, status, snooze_until,
        last_callback_id, created_at, updated_at";

/// SQLite-backed implementation of `ReminderRepository`
pub struct SqliteReminderRepository {
    db: Arc<DbManager>,
}

impl SqliteReminderRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReminderRepositoryPort for SqliteReminderRepository {
    #[instrument(skip(self, record))]
    async fn create_pending(&self, record: ReminderRecord) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;

            let inserted = insert_record_if_absent(&conn, &record)?;
            if inserted {
                return Ok(true);
            }

            // Row already exists; only a still-pending one tracks the new
            // fire time, everything else keeps its state.
            conn.execute(
                "UPDATE reminder_records
                 SET fire_at = ?3, updated_at = ?4
                 WHERE user_id = ?1 AND event_uid = ?2 AND status = ?5",
                params![
                    &record.user_id,
                    &record.event_uid,
                    record.fire_at,
                    record.updated_at,
                    ReminderStatus::Pending.as_str()
                ],
            )
            .map_err(map_sql_error)?;

            Ok(false)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn refresh_pending(
        &self,
        user_id: &str,
        event_uid: &str,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let event_uid = event_uid.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE reminder_records
                 SET fire_at = ?3, updated_at = ?4
                 WHERE user_id = ?1 AND event_uid = ?2 AND status = ?5",
                params![
                    &user_id,
                    &event_uid,
                    fire_at.timestamp(),
                    at.timestamp(),
                    ReminderStatus::Pending.as_str()
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn find_record(
        &self,
        user_id: &str,
        event_uid: &str,
    ) -> DomainResult<Option<ReminderRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let event_uid = event_uid.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<ReminderRecord>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM reminder_records
                     WHERE user_id = ?1 AND event_uid = ?2"
                ),
                params![&user_id, &event_uid],
                map_record_row,
            );

            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn due_reminders(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<ReminderRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let now_ts = now.timestamp();

        task::spawn_blocking(move || -> DomainResult<Vec<ReminderRecord>> {
            let conn = db.get_connection()?;

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM reminder_records
                     WHERE user_id = ?1
                       AND ((status = ?2 AND fire_at <= ?4)
                         OR (status = ?3 AND snooze_until IS NOT NULL AND snooze_until <= ?4))
                     ORDER BY fire_at ASC"
                ))
                .map_err(map_sql_error)?;

            let rows = stmt
                .query_map(
                    params![
                        &user_id,
                        ReminderStatus::Pending.as_str(),
                        ReminderStatus::Snoozed.as_str(),
                        now_ts
                    ],
                    map_record_row,
                )
                .map_err(map_sql_error)?;

            rows.collect::<rusqlite::Result<Vec<ReminderRecord>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn transition_sent(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let event_uid = event_uid.to_string();
        let callback_id = callback_id.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            // A fresh delivery owns the buttons; older callback ids go stale
            // here and the snooze deadline is wiped with them.
            let changed = conn
                .execute(
                    "UPDATE reminder_records
                     SET status = ?5, last_callback_id = ?3, snooze_until = NULL, updated_at = ?4
                     WHERE user_id = ?1 AND event_uid = ?2 AND status IN (?6, ?7)",
                    params![
                        &user_id,
                        &event_uid,
                        &callback_id,
                        at.timestamp(),
                        ReminderStatus::Sent.as_str(),
                        ReminderStatus::Pending.as_str(),
                        ReminderStatus::Snoozed.as_str()
                    ],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn transition_snoozed(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let event_uid = event_uid.to_string();
        let callback_id = callback_id.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE reminder_records
                     SET status = ?6, snooze_until = ?4, updated_at = ?5
                     WHERE user_id = ?1 AND event_uid = ?2
                       AND status = ?7 AND last_callback_id = ?3",
                    params![
                        &user_id,
                        &event_uid,
                        &callback_id,
                        until.timestamp(),
                        at.timestamp(),
                        ReminderStatus::Snoozed.as_str(),
                        ReminderStatus::Sent.as_str()
                    ],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn transition_dismissed(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let event_uid = event_uid.to_string();
        let callback_id = callback_id.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE reminder_records
                     SET status = ?5, updated_at = ?4
                     WHERE user_id = ?1 AND event_uid = ?2
                       AND status IN (?6, ?7) AND last_callback_id = ?3",
                    params![
                        &user_id,
                        &event_uid,
                        &callback_id,
                        at.timestamp(),
                        ReminderStatus::Dismissed.as_str(),
                        ReminderStatus::Sent.as_str(),
                        ReminderStatus::Snoozed.as_str()
                    ],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn delete_active(&self, user_id: &str, event_uid: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let event_uid = event_uid.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM reminder_records
                 WHERE user_id = ?1 AND event_uid = ?2 AND status IN (?3, ?4)",
                params![
                    &user_id,
                    &event_uid,
                    ReminderStatus::Pending.as_str(),
                    ReminderStatus::Snoozed.as_str()
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn purge_stale_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let cutoff_ts = cutoff.timestamp();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute(
                    "DELETE FROM reminder_records
                     WHERE EXISTS (
                             SELECT 1 FROM observed_events e
                             WHERE e.user_id = reminder_records.user_id
                               AND e.uid = reminder_records.event_uid
                               AND e.ends_at < ?1)
                        OR (NOT EXISTS (
                             SELECT 1 FROM observed_events e
                             WHERE e.user_id = reminder_records.user_id
                               AND e.uid = reminder_records.event_uid)
                            AND updated_at < ?1)",
                    params![cutoff_ts],
                )
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

/// Map a row to a ReminderRecord
fn map_record_row(row: &Row) -> rusqlite::Result<ReminderRecord> {
    let status: String = row.get(3)?;
    Ok(ReminderRecord {
        user_id: row.get(0)?,
        event_uid: row.get(1)?,
        fire_at: row.get(2)?,
        status: parse_reminder_status(3, status)?,
        snooze_until: row.get(4)?,
        last_callback_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn parse_reminder_status(index: usize, value: String) -> rusqlite::Result<ReminderStatus> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e.into())
    })
}

/// Insert the record unless one already exists; reports whether a row landed
fn insert_record_if_absent(conn: &SqliteConn, record: &ReminderRecord) -> DomainResult<bool> {
    let params: [&dyn ToSql; 8] = [
        &record.user_id,
        &record.event_uid,
        &record.fire_at,
        &record.status.as_str(),
        &record.snooze_until,
        &record.last_callback_id,
        &record.created_at,
        &record.updated_at,
    ];

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO reminder_records (
                user_id, event_uid, fire_at, status, snooze_until,
                last_callback_id, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params.as_slice(),
        )
        .map_err(map_sql_error)?;

    Ok(inserted > 0)
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
