//! User repository implementation using SQLite
//!
//! Persists registered users and their sealed calendar credentials.

use std::sync::Arc;

use async_trait::async_trait;
use chime_common::storage::SqliteConn;
use chime_core::store_ports::UserRepository as UserRepositoryPort;
use chime_domain::{ChimeError, Result as DomainResult, User, UserStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row, ToSql};
use tokio::task;

use super::manager::DbManager;

const USER_COLUMNS: &str = "id, email, encrypted_credential, calendar_url, status,
        last_synced_at, created_at, updated_at";

/// SQLite-backed implementation of `UserRepository`
pub struct SqliteUserRepository {
    db: Arc<DbManager>,
}

impl SqliteUserRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepositoryPort for SqliteUserRepository {
    async fn save_user(&self, user: User) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_user(&conn, &user)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_user(&self, id: &str) -> DomainResult<Option<User>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<User>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![&id],
                map_user_row,
            );

            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_active_users(&self) -> DomainResult<Vec<User>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<User>> {
            let conn = db.get_connection()?;

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE status = ?1 ORDER BY id ASC"
                ))
                .map_err(map_sql_error)?;

            let rows = stmt
                .query_map(params![UserStatus::Active.as_str()], map_user_row)
                .map_err(map_sql_error)?;

            rows.collect::<rusqlite::Result<Vec<User>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_status(&self, id: &str, status: UserStatus) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE users
                 SET status = ?1, updated_at = CAST(strftime('%s','now') AS INTEGER)
                 WHERE id = ?2",
                params![status.as_str(), &id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let ts = at.timestamp();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE users SET last_synced_at = ?1 WHERE id = ?2",
                params![ts, &id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_user(&self, id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            // Observed events and reminder records cascade via foreign keys
            conn.execute("DELETE FROM users WHERE id = ?1", params![&id]).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to a User
fn map_user_row(row: &Row) -> rusqlite::Result<User> {
    let status: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        encrypted_credential: row.get(2)?,
        calendar_url: row.get(3)?,
        status: parse_user_status(4, status)?,
        last_synced_at: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn parse_user_status(index: usize, value: String) -> rusqlite::Result<UserStatus> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e.into())
    })
}

/// Insert a user, or refresh everything but `created_at` when the id exists
fn upsert_user(conn: &SqliteConn, user: &User) -> DomainResult<()> {
    let params: [&dyn ToSql; 8] = [
        &user.id,
        &user.email,
        &user.encrypted_credential,
        &user.calendar_url,
        &user.status.as_str(),
        &user.last_synced_at,
        &user.created_at,
        &user.updated_at,
    ];

    conn.execute(
        "INSERT INTO users (
            id, email, encrypted_credential, calendar_url, status,
            last_synced_at, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            encrypted_credential = excluded.encrypted_credential,
            calendar_url = excluded.calendar_url,
            status = excluded.status,
            last_synced_at = excluded.last_synced_at,
            updated_at = excluded.updated_at",
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
