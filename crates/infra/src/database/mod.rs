//! Database implementations

pub mod event_repository;
pub mod manager;
pub mod reminder_repository;
pub mod user_repository;

pub use event_repository::*;
pub use manager::*;
pub use reminder_repository::*;
pub use user_repository::*;
