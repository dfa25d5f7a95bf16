//! # Chime Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite repositories)
//! - HTTP client with retry support
//! - External service integrations (CalDAV, Mattermost)
//! - Webhook server for interactive message actions
//! - Scheduling for the periodic sync tick
//!
//! ## Architecture
//! - Implements traits defined in `chime-core`
//! - Depends on `chime-domain`, `chime-common` and `chime-core`
//! - Contains all "impure" code (I/O, network, clock-driven loops)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod scheduling;
pub mod vault;
pub mod webhook;

// Re-export commonly used items
pub use config::*;
pub use database::*;
pub use errors::*;
pub use http::*;
pub use integrations::*;
pub use scheduling::*;
pub use vault::*;
pub use webhook::*;
