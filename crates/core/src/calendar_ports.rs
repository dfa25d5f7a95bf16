//! Port interfaces for calendar access
//!
//! These traits define the boundary between the sync logic and whatever
//! protocol adapter actually talks to the calendar server.

use std::fmt;

use async_trait::async_trait;
use chime_domain::Result;
use chrono::{DateTime, Utc};

/// Credentials for one user's calendar account
///
/// The password only ever exists in plaintext inside the narrow scope of a
/// fetch call; `Debug` is implemented by hand so it cannot leak through
/// formatting.
#[derive(Clone)]
pub struct CalendarCredentials {
    pub username: String,
    pub password: String,
    pub calendar_url: String,
}

impl fmt::Debug for CalendarCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("calendar_url", &self.calendar_url)
            .finish()
    }
}

/// One event occurrence fetched from the calendar
///
/// Each occurrence returned by the server is treated as an independent
/// event identity keyed by `uid`; no recurrence expansion happens on our
/// side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedEvent {
    pub uid: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    /// Fire time requested by the event's own alarm, when present
    pub alarm_at: Option<DateTime<Utc>>,
}

/// Trait for fetching events from a calendar server
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Fetch the events overlapping `[window_start, window_end)`
    ///
    /// # Errors
    /// - `ChimeError::Auth` when the server rejects the credentials
    /// - `ChimeError::Network` for transient transport failures
    /// - `ChimeError::Protocol` when the response cannot be interpreted
    async fn fetch_events(
        &self,
        credentials: &CalendarCredentials,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<FetchedEvent>>;
}

/// Trait for locating a user's calendar collection
#[async_trait]
pub trait CalendarLocator: Send + Sync {
    /// Discover the calendar collection URL for an account
    ///
    /// Also serves as the credential check during registration: a wrong
    /// password surfaces here as `ChimeError::Auth`.
    async fn discover_calendar_url(&self, username: &str, password: &str) -> Result<String>;
}
