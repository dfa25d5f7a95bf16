//! Crate-local error type
//!
//! Deliberately small: this crate only fails while sealing/opening
//! credential envelopes or while talking to the connection pool. Adapters
//! in `chime-infra` fold these into the domain error.

use thiserror::Error;

/// Error type shared by the vault and the storage pool
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CommonError {
    /// Build a crypto error from anything displayable
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    /// Build a storage error from anything displayable
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Result type for chime-common operations
pub type CommonResult<T> = Result<T, CommonError>;
