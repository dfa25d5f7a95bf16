//! # Chime Domain
//!
//! Business domain types and models for Chime.
//!
//! This crate contains:
//! - Domain data types (User, ObservedEvent, ReminderRecord)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and status conversions
//!
//! ## Architecture
//! - No dependencies on other Chime crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
