//! Calendar sync service - core business logic
//!
//! One `run_tick` call is one full polling pass: for every active user it
//! fetches the upcoming calendar window, reconciles the observed event
//! mirror, creates and refreshes reminder records, dispatches whatever is
//! due, and finally purges rows past the retention grace window.
//!
//! Failure routing per user:
//! - `Auth`/`Crypto`: the user is flipped to Degraded and told once;
//!   polling resumes after credential rotation
//! - `Network`/`Protocol`: the pass is abandoned for this tick and retried
//!   on the next one, with stored state untouched
//! - anything else (storage, internal): fatal for this user's pass, other
//!   users still run

use std::collections::HashSet;
use std::sync::Arc;

use chime_domain::{
    CalendarConfig, ChimeError, ObservedEvent, ReminderRecord, ReminderStatus, Result, User,
    UserStatus,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::calendar_ports::{CalendarCredentials, CalendarSource, FetchedEvent};
use crate::clock::{Clock, SystemClock};
use crate::crypto_ports::CredentialCipher;
use crate::messaging_ports::MessagingGateway;
use crate::store_ports::{EventRepository, ReminderRepository, UserRepository};

const CREDENTIAL_NOTICE: &str = "⚠️ Chime could not sign in to your calendar. \
     Reminders are paused until your credentials are updated.";

/// Counters for one completed polling pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub users_synced: usize,
    pub users_deferred: usize,
    pub users_degraded: usize,
    pub users_skipped: usize,
    pub users_failed: usize,
    pub reminders_created: usize,
    pub reminders_sent: usize,
    pub reminders_purged: usize,
    pub events_purged: usize,
}

enum UserSyncOutcome {
    Synced { created: usize, sent: usize },
    Skipped,
    Deferred,
    Degraded,
}

/// Holds a user's slot in the in-flight set
///
/// Released in `Drop`, so a pass cancelled at an await point (tick
/// timeout, shutdown) still frees the slot for the next tick.
struct InFlightSlot<'a> {
    set: &'a Mutex<HashSet<String>>,
    user_id: &'a str,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(self.user_id);
    }
}

/// Calendar sync service
pub struct SyncService {
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventRepository>,
    reminders: Arc<dyn ReminderRepository>,
    calendar: Arc<dyn CalendarSource>,
    gateway: Arc<dyn MessagingGateway>,
    cipher: Arc<dyn CredentialCipher>,
    clock: Arc<dyn Clock>,
    config: CalendarConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl SyncService {
    /// Create a new sync service
    pub fn new(
        users: Arc<dyn UserRepository>,
        events: Arc<dyn EventRepository>,
        reminders: Arc<dyn ReminderRepository>,
        calendar: Arc<dyn CalendarSource>,
        gateway: Arc<dyn MessagingGateway>,
        cipher: Arc<dyn CredentialCipher>,
        config: CalendarConfig,
    ) -> Self {
        Self {
            users,
            events,
            reminders,
            calendar,
            gateway,
            cipher,
            clock: Arc::new(SystemClock),
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the time source (tests pin and advance it)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one full polling pass over all active users
    ///
    /// # Errors
    /// Fails only when the user listing or the retention purge cannot be
    /// read or written; per-user failures are routed into the summary.
    pub async fn run_tick(&self) -> Result<TickSummary> {
        let started = self.clock.now();
        let users = self.users.list_active_users().await?;
        debug!(users = users.len(), "Sync tick started");

        let mut summary = TickSummary::default();
        for user in &users {
            match self.sync_user(user).await {
                Ok(UserSyncOutcome::Synced { created, sent }) => {
                    summary.users_synced += 1;
                    summary.reminders_created += created;
                    summary.reminders_sent += sent;
                }
                Ok(UserSyncOutcome::Skipped) => summary.users_skipped += 1,
                Ok(UserSyncOutcome::Deferred) => summary.users_deferred += 1,
                Ok(UserSyncOutcome::Degraded) => summary.users_degraded += 1,
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "Sync pass failed for user");
                    summary.users_failed += 1;
                }
            }
        }

        // Purge after the user passes so the reminder purge still sees the
        // event rows it joins against.
        let cutoff = started - self.config.grace_period();
        summary.reminders_purged = self.reminders.purge_stale_before(cutoff).await?;
        summary.events_purged = self.events.purge_events_ending_before(cutoff).await?;

        info!(
            users_synced = summary.users_synced,
            users_deferred = summary.users_deferred,
            users_degraded = summary.users_degraded,
            users_skipped = summary.users_skipped,
            users_failed = summary.users_failed,
            reminders_created = summary.reminders_created,
            reminders_sent = summary.reminders_sent,
            reminders_purged = summary.reminders_purged,
            events_purged = summary.events_purged,
            "Sync tick complete"
        );
        Ok(summary)
    }

    /// Run one user's pass with the overlap guard and failure routing
    async fn sync_user(&self, user: &User) -> Result<UserSyncOutcome> {
        if !self.in_flight.lock().insert(user.id.clone()) {
            debug!(user_id = %user.id, "Previous cycle still running; skipping");
            return Ok(UserSyncOutcome::Skipped);
        }
        let _slot = InFlightSlot { set: &self.in_flight, user_id: &user.id };

        match self.sync_user_inner(user).await {
            Ok((created, sent)) => Ok(UserSyncOutcome::Synced { created, sent }),
            Err(ChimeError::Auth(reason)) | Err(ChimeError::Crypto(reason)) => {
                warn!(user_id = %user.id, reason = %reason, "Credentials rejected; pausing user");
                self.users.set_status(&user.id, UserStatus::Degraded).await?;
                if let Err(e) = self.gateway.send_notice(&user.id, CREDENTIAL_NOTICE).await {
                    warn!(user_id = %user.id, error = %e, "Could not deliver credential notice");
                }
                Ok(UserSyncOutcome::Degraded)
            }
            Err(ChimeError::Network(reason)) => {
                warn!(user_id = %user.id, reason = %reason, "Calendar unreachable; deferring to next tick");
                Ok(UserSyncOutcome::Deferred)
            }
            Err(ChimeError::Protocol(reason)) => {
                warn!(user_id = %user.id, reason = %reason, "Calendar response unusable; deferring to next tick");
                Ok(UserSyncOutcome::Deferred)
            }
            Err(e) => Err(e),
        }
    }

    async fn sync_user_inner(&self, user: &User) -> Result<(usize, usize)> {
        let now = self.clock.now();

        let fetched = {
            // Decrypt in the narrowest possible scope: the plaintext lives
            // only for the duration of the fetch call.
            let password = self.cipher.decrypt(&user.encrypted_credential)?;
            let credentials = CalendarCredentials {
                username: user.email.clone(),
                password,
                calendar_url: user.calendar_url.clone(),
            };
            self.calendar
                .fetch_events(&credentials, now, now + self.config.lookahead())
                .await?
        };

        let created = self.reconcile_events(user, &fetched, now).await?;
        let sent = self.dispatch_due(user, now).await?;
        self.users.mark_synced(&user.id, now).await?;
        Ok((created, sent))
    }

    /// Mirror the fetched window into the store and maintain reminders
    async fn reconcile_events(
        &self,
        user: &User,
        fetched: &[FetchedEvent],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let lead = self.config.lead_time();
        let mut created = 0;

        for event in fetched {
            if event.ends_at <= now {
                continue;
            }
            self.events.upsert_event(to_observed(&user.id, event, now)).await?;

            let fire_at = event.alarm_at.unwrap_or(event.starts_at - lead);
            if event.starts_at - now <= lead || fire_at <= now {
                let record = ReminderRecord {
                    user_id: user.id.clone(),
                    event_uid: event.uid.clone(),
                    fire_at: fire_at.timestamp(),
                    status: ReminderStatus::Pending,
                    snooze_until: None,
                    last_callback_id: None,
                    created_at: now.timestamp(),
                    updated_at: now.timestamp(),
                };
                if self.reminders.create_pending(record).await? {
                    created += 1;
                }
            } else {
                // Outside the creation window the fire time still follows
                // the event if a Pending record already exists.
                self.reminders.refresh_pending(&user.id, &event.uid, fire_at, now).await?;
            }
        }

        // Cancellation sweep: upcoming rows absent from the fetch are gone
        // from the calendar (or moved beyond the window). Active reminders
        // go with them; Sent and Dismissed history stays for the purge.
        let known: HashSet<&str> = fetched.iter().map(|e| e.uid.as_str()).collect();
        for observed in self.events.list_upcoming_events(&user.id, now).await? {
            if !known.contains(observed.uid.as_str()) {
                debug!(user_id = %user.id, uid = %observed.uid, "Event no longer on calendar; clearing");
                self.reminders.delete_active(&user.id, &observed.uid).await?;
                self.events.delete_event(&user.id, &observed.uid).await?;
            }
        }

        Ok(created)
    }

    /// Send every due reminder, then advance its record
    ///
    /// Delivery happens before the status write: a crash between the two
    /// re-sends on the next pass rather than losing the reminder.
    async fn dispatch_due(&self, user: &User, now: DateTime<Utc>) -> Result<usize> {
        let due = self.reminders.due_reminders(&user.id, now).await?;
        let mut sent = 0;

        for record in due {
            let Some(event) = self.events.find_event(&user.id, &record.event_uid).await? else {
                debug!(user_id = %user.id, uid = %record.event_uid, "Due reminder has no event; clearing");
                self.reminders.delete_active(&user.id, &record.event_uid).await?;
                continue;
            };
            if event.ends_at <= now.timestamp() {
                debug!(user_id = %user.id, uid = %record.event_uid, "Event already over; clearing reminder");
                self.reminders.delete_active(&user.id, &record.event_uid).await?;
                continue;
            }

            match self.gateway.send_reminder(&user.id, &event).await {
                Ok(callback_id) => {
                    let advanced = self
                        .reminders
                        .transition_sent(&user.id, &record.event_uid, &callback_id, now)
                        .await?;
                    if !advanced {
                        debug!(user_id = %user.id, uid = %record.event_uid, "Record changed state during send");
                    }
                    sent += 1;
                }
                Err(e) => {
                    warn!(
                        user_id = %user.id,
                        uid = %record.event_uid,
                        error = %e,
                        "Reminder delivery failed; will retry next tick"
                    );
                }
            }
        }

        Ok(sent)
    }
}

fn to_observed(user_id: &str, event: &FetchedEvent, now: DateTime<Utc>) -> ObservedEvent {
    ObservedEvent {
        user_id: user_id.to_string(),
        uid: event.uid.clone(),
        title: event.title.clone(),
        starts_at: event.starts_at.timestamp(),
        ends_at: event.ends_at.timestamp(),
        location: event.location.clone(),
        alarm_at: event.alarm_at.map(|a| a.timestamp()),
        last_seen_at: now.timestamp(),
    }
}
