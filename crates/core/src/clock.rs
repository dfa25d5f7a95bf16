//! Injectable time source
//!
//! Every service reads time through [`Clock`] so tests can pin "now" and
//! walk it forward tick by tick.

use chrono::{DateTime, Utc};

/// Trait for reading the current time
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside of tests
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
