//! Shared utilities used across Chime crates.
//!
//! This crate holds the pieces that sit below the domain services but are
//! not adapters for any particular external system:
//!
//! - [`crypto`]: the credential vault (AES-256-GCM envelopes for per-user
//!   app passwords)
//! - [`storage`]: the r2d2/rusqlite connection pool with the pragmas every
//!   connection needs
//! - [`error`]: the crate-local error type the two modules share
//!
//! Nothing here depends on other Chime crates; adapters convert
//! [`CommonError`] into the domain error at the infra boundary.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod crypto;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use crypto::{CredentialVault, EncryptedCredential};
pub use error::{CommonError, CommonResult};
pub use storage::{SqliteConn, SqlitePool};
