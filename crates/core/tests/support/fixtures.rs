use chime_core::{CredentialCipher, FetchedEvent};
use chime_domain::{ObservedEvent, ReminderRecord, ReminderStatus, User, UserStatus};
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::crypto::PlainCipher;

/// Instant the manual clocks start at: 2025-03-10 14:00:00 UTC.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap()
}

/// An active registered user whose credential opens under [`PlainCipher`].
pub fn test_user(id: &str) -> User {
    let now = base_time().timestamp();
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        encrypted_credential: PlainCipher.encrypt("app-password").unwrap(),
        calendar_url: format!("https://cal.example.com/calendars/{id}/"),
        status: UserStatus::Active,
        last_synced_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// A one-hour calendar event starting at `starts_at`, no alarm.
pub fn fetched_event(uid: &str, starts_at: DateTime<Utc>) -> FetchedEvent {
    FetchedEvent {
        uid: uid.to_string(),
        title: format!("Meeting {uid}"),
        starts_at,
        ends_at: starts_at + Duration::hours(1),
        location: None,
        alarm_at: None,
    }
}

/// The observed-event row a sync pass would mirror for [`fetched_event`].
pub fn observed_event(user_id: &str, uid: &str, starts_at: DateTime<Utc>) -> ObservedEvent {
    ObservedEvent {
        user_id: user_id.to_string(),
        uid: uid.to_string(),
        title: format!("Meeting {uid}"),
        starts_at: starts_at.timestamp(),
        ends_at: (starts_at + Duration::hours(1)).timestamp(),
        location: None,
        alarm_at: None,
        last_seen_at: base_time().timestamp(),
    }
}

/// A reminder record in `status` with no delivery attached yet.
pub fn reminder_record(
    user_id: &str,
    event_uid: &str,
    fire_at: DateTime<Utc>,
    status: ReminderStatus,
) -> ReminderRecord {
    ReminderRecord {
        user_id: user_id.to_string(),
        event_uid: event_uid.to_string(),
        fire_at: fire_at.timestamp(),
        status,
        snooze_until: None,
        last_callback_id: None,
        created_at: base_time().timestamp(),
        updated_at: base_time().timestamp(),
    }
}

/// A delivered record whose live buttons carry `callback_id`.
pub fn sent_record(
    user_id: &str,
    event_uid: &str,
    fire_at: DateTime<Utc>,
    callback_id: &str,
) -> ReminderRecord {
    ReminderRecord {
        last_callback_id: Some(callback_id.to_string()),
        ..reminder_record(user_id, event_uid, fire_at, ReminderStatus::Sent)
    }
}
