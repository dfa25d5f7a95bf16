//! Port interfaces for the state store
//!
//! These traits define the boundaries between core business logic and the
//! SQLite repositories. All status transitions are single guarded updates:
//! the implementation must apply the status precondition and the write in
//! one statement, and report through the returned `bool` whether a row
//! actually changed.

use async_trait::async_trait;
use chime_domain::{ObservedEvent, ReminderRecord, Result, User, UserStatus};
use chrono::{DateTime, Utc};

/// Trait for user persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or replace a user row
    async fn save_user(&self, user: User) -> Result<()>;

    /// Get a user by messaging id
    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    /// List the users currently eligible for polling
    async fn list_active_users(&self) -> Result<Vec<User>>;

    /// Flip a user's status
    async fn set_status(&self, id: &str, status: UserStatus) -> Result<()>;

    /// Record a completed sync pass
    async fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Remove a user and, via foreign keys, everything observed for them
    async fn delete_user(&self, id: &str) -> Result<()>;
}

/// Trait for the per-user observed event mirror
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert or refresh an observed event row
    async fn upsert_event(&self, event: ObservedEvent) -> Result<()>;

    /// Get one observed event
    async fn find_event(&self, user_id: &str, uid: &str) -> Result<Option<ObservedEvent>>;

    /// List a user's observed events that start after `after`
    async fn list_upcoming_events(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<ObservedEvent>>;

    /// Remove one observed event
    async fn delete_event(&self, user_id: &str, uid: &str) -> Result<()>;

    /// Remove events whose end time predates `cutoff`; returns rows removed
    async fn purge_events_ending_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Trait for reminder lifecycle persistence
///
/// The three `transition_*` operations are compare-and-set: they apply
/// only when the record is in an admissible status (and, for the button
/// transitions, when `callback_id` matches the delivery that owns the live
/// buttons). `false` means the guard rejected the write.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Create a Pending record, or refresh the fire time of an existing
    /// Pending one. Records in any other status are left untouched.
    /// Returns `true` only when a new row was inserted.
    async fn create_pending(&self, record: ReminderRecord) -> Result<bool>;

    /// Update the fire time of an existing Pending record, if any
    async fn refresh_pending(
        &self,
        user_id: &str,
        event_uid: &str,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Get one reminder record
    async fn find_record(&self, user_id: &str, event_uid: &str) -> Result<Option<ReminderRecord>>;

    /// List a user's reminders due at `now`: Pending ones past their fire
    /// time and Snoozed ones past their snooze deadline
    async fn due_reminders(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<ReminderRecord>>;

    /// Pending or Snoozed -> Sent, recording the delivery's callback id
    async fn transition_sent(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Sent -> Snoozed, guarded by the live callback id
    async fn transition_snoozed(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Sent or Snoozed -> Dismissed, guarded by the live callback id
    async fn transition_dismissed(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Remove a Pending or Snoozed record; Sent and Dismissed rows stay
    async fn delete_active(&self, user_id: &str, event_uid: &str) -> Result<()>;

    /// Remove records whose event ended before `cutoff`, together with
    /// records whose event row is gone and whose last update predates
    /// `cutoff`; returns rows removed
    async fn purge_stale_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
