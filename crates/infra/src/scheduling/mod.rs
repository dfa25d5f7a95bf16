//! Scheduling infrastructure for the background sync loop
//!
//! One interval-based scheduler drives the whole pipeline: each tick runs
//! `SyncService::run_tick` over every active user.
//!
//! The scheduler follows explicit runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handle for the spawned task
//! - Cancellation token support
//! - Timeout wrapping on every tick
//! - Structured tracing of per-tick summaries

pub mod error;
pub mod reminder_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use reminder_scheduler::{ReminderScheduler, ReminderSchedulerConfig};
