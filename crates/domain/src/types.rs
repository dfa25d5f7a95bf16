//! Common data types used throughout the application
//!
//! These types mirror the database schema and are shared by repository
//! ports, services and adapters. Timestamps cross the SQLite boundary as
//! Unix seconds (`i64`); the `*_utc` helpers convert back when the
//! calendar arithmetic needs a [`DateTime`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// A registered user with a calendar subscription
///
/// `id` is the messaging platform user id and the primary identity
/// everywhere. `encrypted_credential` holds the vault envelope produced at
/// registration; the plaintext app password never reaches this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub encrypted_credential: String,
    pub calendar_url: String,
    pub status: UserStatus,
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// User account health from the sync loop's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Credentials work; user is polled every tick
    Active,
    /// Credentials were rejected; polling is paused until rotation
    Degraded,
}

impl_status_conversions!(UserStatus {
    Active => "active",
    Degraded => "degraded",
});

/// A calendar event as last observed for a user
///
/// One row per `(user_id, uid)`. Rows are refreshed on every poll and
/// removed by the retention purge once the event is safely in the past.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub user_id: String,
    pub uid: String,
    pub title: String,
    pub starts_at: i64,
    pub ends_at: i64,
    pub location: Option<String>,
    /// Fire time requested by the event's own alarm, when it carries one
    pub alarm_at: Option<i64>,
    pub last_seen_at: i64,
}

impl ObservedEvent {
    /// Get start time as `DateTime<Utc>`
    pub fn starts_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.starts_at, 0)
    }

    /// Get end time as `DateTime<Utc>`
    pub fn ends_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.ends_at, 0)
    }
}

/// Reminder lifecycle entry for one observed event
///
/// Keyed by `(user_id, event_uid)`; there is at most one reminder per
/// event per user. All transitions between statuses go through guarded
/// single-statement updates in the store so concurrent writers cannot
/// revive a terminal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub user_id: String,
    pub event_uid: String,
    pub fire_at: i64,
    pub status: ReminderStatus,
    pub snooze_until: Option<i64>,
    /// Callback id of the delivery that last changed this record
    pub last_callback_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ReminderRecord {
    /// Get fire time as `DateTime<Utc>`
    pub fn fire_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.fire_at, 0)
    }
}

/// Reminder delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    /// Created, waiting for its fire time
    Pending,
    /// Delivered at least once; waiting for a button press or purge
    Sent,
    /// Postponed by the user; re-fires at `snooze_until`
    Snoozed,
    /// Acknowledged; never delivered again
    Dismissed,
}

impl ReminderStatus {
    /// Whether the status permits no further deliveries
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dismissed)
    }
}

impl_status_conversions!(ReminderStatus {
    Pending => "pending",
    Sent => "sent",
    Snoozed => "snoozed",
    Dismissed => "dismissed",
});

/// Button action carried in a reminder callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderAction {
    Snooze,
    Dismiss,
}

impl_status_conversions!(ReminderAction {
    Snooze => "snooze",
    Dismiss => "dismiss",
});

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn reminder_status_round_trips_through_storage_form() {
        for status in [
            ReminderStatus::Pending,
            ReminderStatus::Sent,
            ReminderStatus::Snoozed,
            ReminderStatus::Dismissed,
        ] {
            let parsed = ReminderStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(ReminderStatus::from_str("SNOOZED").unwrap(), ReminderStatus::Snoozed);
        assert_eq!(UserStatus::from_str("Degraded").unwrap(), UserStatus::Degraded);
        assert_eq!(ReminderAction::from_str("DISMISS").unwrap(), ReminderAction::Dismiss);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = ReminderStatus::from_str("archived").unwrap_err();
        assert!(err.contains("Invalid ReminderStatus"));
    }

    #[test]
    fn only_dismissed_is_terminal() {
        assert!(ReminderStatus::Dismissed.is_terminal());
        assert!(!ReminderStatus::Pending.is_terminal());
        assert!(!ReminderStatus::Sent.is_terminal());
        assert!(!ReminderStatus::Snoozed.is_terminal());
    }

    #[test]
    fn event_timestamps_convert_to_utc() {
        let event = ObservedEvent {
            user_id: "u1".to_string(),
            uid: "evt-1".to_string(),
            title: "Standup".to_string(),
            starts_at: 1_700_000_000,
            ends_at: 1_700_003_600,
            location: None,
            alarm_at: None,
            last_seen_at: 1_699_999_000,
        };
        let start = event.starts_at_utc().unwrap();
        let end = event.ends_at_utc().unwrap();
        assert_eq!((end - start).num_seconds(), 3600);
    }
}
