//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Polling configuration
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOOKAHEAD_SECS: u64 = 24 * 60 * 60;

// Reminder timing
pub const DEFAULT_LEAD_TIME_SECS: u64 = 15 * 60;
pub const DEFAULT_SNOOZE_SECS: u64 = 10 * 60;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_TIMEZONE: &str = "UTC";

// Storage
pub const DEFAULT_DB_POOL_SIZE: u32 = 8;
pub const CREDENTIAL_KEY_LEN: usize = 32;

// Webhook endpoint
pub const DEFAULT_WEBHOOK_BIND_ADDR: &str = "0.0.0.0:8080";
pub const ACTION_ROUTE: &str = "/actions";
