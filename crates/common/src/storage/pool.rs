//! SQLite connection pool
//!
//! Provides r2d2-based connection pooling for the state store. Every
//! connection gets the same pragma batch on initialization: WAL journaling
//! for concurrent readers, NORMAL synchronous mode, foreign keys on and a
//! busy timeout so writers queue instead of failing on lock contention.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{CommonError, CommonResult};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pooled connection handle used by the repositories.
pub type SqliteConn = PooledConnection<SqliteConnectionManager>;

/// SQLite connection pool
///
/// Wraps an r2d2 pool; schema management stays with the application layer.
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqlitePool {
    /// Create a new pool for the database at `path`.
    ///
    /// A test connection is checked out immediately so misconfiguration
    /// (bad path, unreadable file) fails here instead of on first use.
    ///
    /// # Errors
    /// Returns [`CommonError::Storage`] if the pool cannot be built or the
    /// test connection fails.
    pub fn new(path: &Path, pool_size: u32) -> CommonResult<Self> {
        info!(db_path = %path.display(), pool_size, "Creating SQLite connection pool");

        let manager = SqliteConnectionManager::file(path).with_init(apply_connection_pragmas);

        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {e}");
                CommonError::storage(format!("Failed to create pool: {e}"))
            })?;

        let conn = pool
            .get()
            .map_err(|e| CommonError::storage(format!("Failed to get test connection: {e}")))?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| CommonError::storage(format!("Test query failed: {e}")))?;
        debug!("Connection pool verified");

        Ok(Self { pool, path: path.to_path_buf() })
    }

    /// Check out a connection.
    ///
    /// # Errors
    /// Returns [`CommonError::Storage`] when the pool is exhausted past the
    /// checkout timeout.
    pub fn get(&self) -> CommonResult<SqliteConn> {
        self.pool.get().map_err(|e| {
            warn!("Connection checkout failed: {e}");
            CommonError::storage(format!("Failed to get connection: {e}"))
        })
    }

    /// Verify the database answers a trivial query.
    pub fn health_check(&self) -> CommonResult<()> {
        let conn = self.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| CommonError::storage(format!("Health check failed: {e}")))?;
        Ok(())
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn apply_connection_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;\n\
         PRAGMA synchronous=NORMAL;\n\
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
