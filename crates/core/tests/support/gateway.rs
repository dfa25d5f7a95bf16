use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chime_core::MessagingGateway;
use chime_domain::{ChimeError, ObservedEvent, Result as DomainResult};

/// One reminder delivery captured by [`RecordingGateway`].
#[derive(Debug, Clone)]
pub struct SentReminder {
    pub user_id: String,
    pub event_uid: String,
    pub callback_id: String,
}

/// Recording [`MessagingGateway`] with deterministic callback ids.
///
/// Callback ids are `cb-1`, `cb-2`, ... in delivery order so tests can
/// replay the exact id a button press would carry.
#[derive(Default)]
pub struct RecordingGateway {
    reminders: Mutex<Vec<SentReminder>>,
    notices: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
    counter: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail until reset.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Reminder deliveries so far, in order.
    pub fn sent(&self) -> Vec<SentReminder> {
        self.reminders.lock().unwrap().clone()
    }

    /// Plain notices so far, as `(user_id, text)` pairs.
    pub fn notices(&self) -> Vec<(String, String)> {
        self.notices.lock().unwrap().clone()
    }

    /// Callback id of the most recent delivery.
    pub fn last_callback_id(&self) -> Option<String> {
        self.reminders
            .lock()
            .unwrap()
            .last()
            .map(|r| r.callback_id.clone())
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_reminder(&self, user_id: &str, event: &ObservedEvent) -> DomainResult<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChimeError::Delivery("Message post rejected".to_string()));
        }
        let callback_id = format!("cb-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.reminders.lock().unwrap().push(SentReminder {
            user_id: user_id.to_string(),
            event_uid: event.uid.clone(),
            callback_id: callback_id.clone(),
        });
        Ok(callback_id)
    }

    async fn send_notice(&self, user_id: &str, text: &str) -> DomainResult<()> {
        self.notices
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}
