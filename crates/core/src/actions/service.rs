//! Action handling service - core business logic
//!
//! Processes the snooze/dismiss callbacks posted back by the messaging
//! platform. Every outcome that is not a clean state transition collapses
//! into the same [`ActionReply::Noop`]: bad token, unknown action, stale
//! callback id, terminal record or no record at all. A caller probing the
//! endpoint learns nothing about which of those it hit.

use std::sync::Arc;

use chime_domain::{ReminderAction, Result};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::store_ports::ReminderRepository;

/// A button callback, already stripped of transport framing
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub user_id: String,
    pub event_uid: String,
    pub callback_id: String,
    /// Raw action name from the button context
    pub action: String,
    /// Shared-secret token the buttons were issued with
    pub token: String,
}

/// Outcome handed back to the webhook layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReply {
    /// The transition applied; `text` replaces the reminder card
    Applied { text: String },
    /// Nothing changed; reply with the uniform no-op message
    Noop,
}

/// Action handling service
pub struct ActionService {
    reminders: Arc<dyn ReminderRepository>,
    clock: Arc<dyn Clock>,
    shared_secret: String,
    snooze: chrono::Duration,
    tz: Tz,
}

impl ActionService {
    /// Create a new action service
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        shared_secret: String,
        snooze: chrono::Duration,
        tz: Tz,
    ) -> Self {
        Self { reminders, clock: Arc::new(SystemClock), shared_secret, snooze, tz }
    }

    /// Replace the time source (tests pin and advance it)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply one button callback
    ///
    /// # Errors
    /// Fails only on storage errors; every rejected callback is a normal
    /// `Ok(Noop)`.
    pub async fn handle_action(&self, request: ActionRequest) -> Result<ActionReply> {
        if !self.token_matches(&request.token) {
            debug!(user_id = %request.user_id, "Callback token rejected");
            return Ok(ActionReply::Noop);
        }
        let Ok(action) = request.action.parse::<ReminderAction>() else {
            debug!(user_id = %request.user_id, action = %request.action, "Unknown callback action");
            return Ok(ActionReply::Noop);
        };

        let now = self.clock.now();
        let applied = match action {
            ReminderAction::Snooze => {
                let until = now + self.snooze;
                let applied = self
                    .reminders
                    .transition_snoozed(
                        &request.user_id,
                        &request.event_uid,
                        &request.callback_id,
                        until,
                        now,
                    )
                    .await?;
                if applied {
                    let local = until.with_timezone(&self.tz);
                    Some(format!("⏰ Reminder snoozed until {}.", local.format("%H:%M")))
                } else {
                    None
                }
            }
            ReminderAction::Dismiss => {
                let applied = self
                    .reminders
                    .transition_dismissed(
                        &request.user_id,
                        &request.event_uid,
                        &request.callback_id,
                        now,
                    )
                    .await?;
                applied.then(|| "✅ Reminder dismissed.".to_string())
            }
        };

        match applied {
            Some(text) => {
                info!(
                    user_id = %request.user_id,
                    event_uid = %request.event_uid,
                    action = %action,
                    "Reminder action applied"
                );
                Ok(ActionReply::Applied { text })
            }
            None => {
                debug!(
                    user_id = %request.user_id,
                    event_uid = %request.event_uid,
                    action = %action,
                    "Reminder action did not apply"
                );
                Ok(ActionReply::Noop)
            }
        }
    }

    /// Compare digests so the check does not short-circuit on length
    fn token_matches(&self, token: &str) -> bool {
        use sha2::{Digest, Sha256};
        Sha256::digest(token.as_bytes()) == Sha256::digest(self.shared_secret.as_bytes())
    }
}
