//! Storage primitives
//!
//! r2d2-based connection pooling for the SQLite state store, with the
//! per-connection pragmas (WAL, foreign keys, busy timeout) applied on
//! checkout.

pub mod pool;

// Re-export commonly used types
pub use pool::{SqliteConn, SqlitePool};
