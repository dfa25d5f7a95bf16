//! Calendar sync and reminder dispatch

pub mod service;

pub use service::{SyncService, TickSummary};
