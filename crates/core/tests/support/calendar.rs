use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chime_core::{CalendarCredentials, CalendarLocator, CalendarSource, FetchedEvent};
use chime_domain::{ChimeError, Result as DomainResult};
use chrono::{DateTime, Utc};

/// Scriptable in-memory stand-in for a calendar server.
///
/// Holds the "current" calendar contents; `fetch_events` returns the
/// subset overlapping the requested window. Tests mutate the contents
/// between ticks, queue one-shot failures, or add an artificial delay to
/// keep a fetch in flight while another tick runs.
#[derive(Default)]
pub struct ScriptedCalendarSource {
    events: Mutex<Vec<FetchedEvent>>,
    next_failure: Mutex<Option<ChimeError>>,
    delay: Mutex<Option<std::time::Duration>>,
    calls: AtomicUsize,
}

impl ScriptedCalendarSource {
    /// Create a source seeded with the provided events.
    pub fn new(events: Vec<FetchedEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    /// Replace the calendar contents seen by subsequent fetches.
    pub fn set_events(&self, events: Vec<FetchedEvent>) {
        *self.events.lock().unwrap() = events;
    }

    /// Make the next fetch fail with `error`, then recover.
    pub fn fail_next_with(&self, error: ChimeError) {
        *self.next_failure.lock().unwrap() = Some(error);
    }

    /// Sleep inside every fetch, keeping the cycle in flight.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for ScriptedCalendarSource {
    async fn fetch_events(
        &self,
        _credentials: &CalendarCredentials,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> DomainResult<Vec<FetchedEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.next_failure.lock().unwrap().take() {
            return Err(error);
        }

        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.starts_at < window_end && event.ends_at > window_start)
            .cloned()
            .collect())
    }
}

/// [`CalendarLocator`] answering with a fixed URL scheme.
///
/// With an expected password set, any other password is rejected as an
/// auth failure, mirroring a discovery probe against a real server.
#[derive(Default)]
pub struct StaticLocator {
    expected_password: Option<String>,
}

impl StaticLocator {
    /// Accept only `password` during discovery.
    pub fn expecting(password: &str) -> Self {
        Self {
            expected_password: Some(password.to_string()),
        }
    }
}

#[async_trait]
impl CalendarLocator for StaticLocator {
    async fn discover_calendar_url(&self, username: &str, password: &str) -> DomainResult<String> {
        if let Some(expected) = &self.expected_password {
            if password != expected {
                return Err(ChimeError::Auth(
                    "Calendar server rejected credentials".to_string(),
                ));
            }
        }
        Ok(format!("https://cal.example.com/calendars/{username}/"))
    }
}
