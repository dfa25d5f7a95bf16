//! End-to-end coverage for the calendar sync service.
//!
//! Each test drives full polling passes against in-memory ports with a
//! manually advanced clock, checking reminder creation, dispatch, failure
//! routing and retention behaviour tick by tick.

mod support;

use std::sync::Arc;

use chime_core::{ReminderRepository, SyncService};
use chime_domain::{CalendarConfig, ChimeError, ReminderStatus, User, UserStatus};
use chrono::Duration;

use support::calendar::ScriptedCalendarSource;
use support::clock::ManualClock;
use support::crypto::PlainCipher;
use support::fixtures::{base_time, fetched_event, observed_event, reminder_record, test_user};
use support::gateway::RecordingGateway;
use support::store::InMemoryStore;

struct Harness {
    store: InMemoryStore,
    calendar: Arc<ScriptedCalendarSource>,
    gateway: Arc<RecordingGateway>,
    clock: Arc<ManualClock>,
    service: SyncService,
}

/// Build a service around one active user ("alice") and the given
/// calendar contents. Lead time 15 min, lookahead 24 h, grace 24 h.
fn harness(events: Vec<chime_core::FetchedEvent>) -> Harness {
    let store = InMemoryStore::new();
    store.insert_user(test_user("alice"));

    let calendar = Arc::new(ScriptedCalendarSource::new(events));
    let gateway = Arc::new(RecordingGateway::new());
    let clock = Arc::new(ManualClock::new(base_time()));

    let service = SyncService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        calendar.clone(),
        gateway.clone(),
        Arc::new(PlainCipher),
        CalendarConfig::default(),
    )
    .with_clock(clock.clone());

    Harness { store, calendar, gateway, clock, service }
}

#[tokio::test]
async fn tick_inside_lead_window_creates_and_sends() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);

    let summary = h.service.run_tick().await.expect("tick should succeed");

    assert_eq!(summary.users_synced, 1);
    assert_eq!(summary.reminders_created, 1);
    assert_eq!(summary.reminders_sent, 1);
    assert_eq!(summary.users_failed, 0);

    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Sent);
    assert_eq!(record.last_callback_id.as_deref(), Some("cb-1"));
    assert!(record.snooze_until.is_none());

    let event = h.store.event("alice", "evt-1").expect("event should be mirrored");
    assert_eq!(event.title, "Meeting evt-1");

    let sent = h.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, "alice");
    assert_eq!(sent[0].event_uid, "evt-1");

    let user = h.store.user("alice").expect("user should exist");
    assert_eq!(user.last_synced_at, Some(base_time().timestamp()), "sync time should be recorded");
}

#[tokio::test]
async fn event_beyond_lead_waits_for_the_window() {
    // Starts at 15:00; first tick runs at 14:00, one hour out.
    let start = base_time() + Duration::hours(1);
    let h = harness(vec![fetched_event("evt-1", start)]);

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_created, 0, "event is still outside the lead window");
    assert_eq!(summary.reminders_sent, 0);
    assert!(h.store.record("alice", "evt-1").is_none());
    assert!(h.store.event("alice", "evt-1").is_some(), "event should be mirrored regardless");

    // 14:45 is exactly start minus lead time.
    h.clock.set(start - Duration::minutes(15));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_created, 1);
    assert_eq!(summary.reminders_sent, 1);

    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Sent);
    assert_eq!(record.fire_at, (start - Duration::minutes(15)).timestamp());
    assert_eq!(h.gateway.sent().len(), 1);
}

#[tokio::test]
async fn absolute_alarm_fires_ahead_of_lead_window() {
    let start = base_time() + Duration::hours(4);
    let mut event = fetched_event("evt-1", start);
    event.alarm_at = Some(base_time() + Duration::minutes(30));
    let h = harness(vec![event]);

    h.service.run_tick().await.expect("tick should succeed");
    assert!(h.store.record("alice", "evt-1").is_none(), "alarm time has not arrived yet");

    h.clock.advance(Duration::minutes(30));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_sent, 1);

    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Sent);
    assert_eq!(record.fire_at, (base_time() + Duration::minutes(30)).timestamp());
}

#[tokio::test]
async fn pending_record_fires_exactly_once_after_restart() {
    // State as persisted by a run that stopped between create and send.
    let start = base_time() + Duration::minutes(10);
    let h = harness(vec![fetched_event("evt-1", start)]);
    h.store.insert_event(observed_event("alice", "evt-1", start));
    h.store.insert_record(reminder_record(
        "alice",
        "evt-1",
        start - Duration::minutes(15),
        ReminderStatus::Pending,
    ));

    h.clock.set(base_time() + Duration::minutes(50));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_created, 0, "existing record must not count as created");
    assert_eq!(summary.reminders_sent, 1);

    h.clock.advance(Duration::minutes(1));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_sent, 0);
    assert_eq!(h.gateway.sent().len(), 1, "reminder must go out exactly once");
}

#[tokio::test]
async fn delivery_failure_leaves_record_pending_for_retry() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.gateway.set_fail_sends(true);

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_synced, 1, "delivery failure is not a sync failure");
    assert_eq!(summary.reminders_created, 1);
    assert_eq!(summary.reminders_sent, 0);
    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Pending, "failed delivery must not advance status");

    h.gateway.set_fail_sends(false);
    h.clock.advance(Duration::minutes(1));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_sent, 1);
    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Sent);
    assert_eq!(h.gateway.sent().len(), 1);
}

#[tokio::test]
async fn snoozed_record_refires_with_fresh_buttons() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.service.run_tick().await.expect("tick should succeed");

    // Button press at 14:46, snoozing until 14:56.
    let pressed_at = base_time() + Duration::minutes(46);
    let until = pressed_at + Duration::minutes(10);
    let applied = h
        .store
        .transition_snoozed("alice", "evt-1", "cb-1", until, pressed_at)
        .await
        .expect("transition should succeed");
    assert!(applied, "snooze on the live delivery should apply");

    h.clock.set(until);
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_sent, 1);

    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Sent);
    assert_eq!(record.last_callback_id.as_deref(), Some("cb-2"), "re-fire issues fresh buttons");
    assert!(record.snooze_until.is_none(), "re-fire clears the snooze deadline");
    assert_eq!(h.gateway.sent().len(), 2);
}

#[tokio::test]
async fn auth_failure_degrades_user_and_sends_one_notice() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.calendar.fail_next_with(ChimeError::Auth("401 Unauthorized".to_string()));

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_degraded, 1);
    assert_eq!(summary.users_synced, 0);

    let user = h.store.user("alice").expect("user should exist");
    assert_eq!(user.status, UserStatus::Degraded);
    let notices = h.gateway.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].1.contains("credentials"), "notice should explain the pause");
    assert!(h.gateway.sent().is_empty(), "no reminders for a degraded user");

    // Degraded users drop out of the polling set entirely.
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_synced + summary.users_degraded, 0);
    assert_eq!(h.gateway.notices().len(), 1, "notice must not repeat every tick");
    assert_eq!(h.calendar.calls(), 1);
}

#[tokio::test]
async fn unreadable_credential_degrades_without_fetching() {
    let h = harness(vec![]);
    h.store.insert_user(User {
        encrypted_credential: "not-an-envelope".to_string(),
        ..test_user("alice")
    });

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_degraded, 1);
    assert_eq!(h.calendar.calls(), 0, "decryption fails before any network call");
    assert_eq!(h.store.user("alice").expect("user should exist").status, UserStatus::Degraded);
    assert_eq!(h.gateway.notices().len(), 1);
}

#[tokio::test]
async fn network_failure_defers_and_preserves_state() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.service.run_tick().await.expect("tick should succeed");

    h.calendar.fail_next_with(ChimeError::Network("connection timed out".to_string()));
    h.clock.advance(Duration::minutes(1));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_deferred, 1);
    assert_eq!(summary.users_synced, 0);

    let user = h.store.user("alice").expect("user should exist");
    assert_eq!(user.status, UserStatus::Active, "transient failures must not degrade");
    assert_eq!(user.last_synced_at, Some(base_time().timestamp()), "failed pass is not a sync");
    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Sent, "stored state stays untouched");
    assert!(h.store.event("alice", "evt-1").is_some());

    h.clock.advance(Duration::minutes(1));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_synced, 1, "next tick retries naturally");
}

#[tokio::test]
async fn malformed_response_defers_tick() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.calendar.fail_next_with(ChimeError::Protocol("unexpected multistatus".to_string()));

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.users_deferred, 1);
    assert_eq!(h.store.user("alice").expect("user should exist").status, UserStatus::Active);
    assert!(h.store.record("alice", "evt-1").is_none());
}

#[tokio::test]
async fn one_users_failure_does_not_block_others() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.store.insert_user(test_user("bob"));

    // Users are polled in id order; the one-shot failure lands on alice.
    h.calendar.fail_next_with(ChimeError::Auth("401 Unauthorized".to_string()));
    let summary = h.service.run_tick().await.expect("tick should succeed");

    assert_eq!(summary.users_degraded, 1);
    assert_eq!(summary.users_synced, 1);
    assert_eq!(summary.reminders_sent, 1);
    assert_eq!(h.store.user("alice").expect("alice should exist").status, UserStatus::Degraded);
    assert_eq!(h.store.user("bob").expect("bob should exist").status, UserStatus::Active);

    let sent = h.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, "bob");
}

#[tokio::test]
async fn concurrent_tick_skips_in_flight_user() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.calendar.set_delay(std::time::Duration::from_millis(50));

    let (a, b) = tokio::join!(h.service.run_tick(), h.service.run_tick());
    let a = a.expect("first tick should succeed");
    let b = b.expect("second tick should succeed");

    assert_eq!(a.users_synced + b.users_synced, 1, "exactly one pass runs the user");
    assert_eq!(a.users_skipped + b.users_skipped, 1, "the overlapping pass is skipped");
    assert_eq!(h.calendar.calls(), 1, "skipped pass never reaches the calendar");
    assert_eq!(h.gateway.sent().len(), 1);
}

#[tokio::test]
async fn cancelled_event_drops_active_reminder() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.gateway.set_fail_sends(true);
    h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(
        h.store.record("alice", "evt-1").expect("record should exist").status,
        ReminderStatus::Pending
    );

    h.calendar.set_events(vec![]);
    h.gateway.set_fail_sends(false);
    h.clock.advance(Duration::minutes(1));
    h.service.run_tick().await.expect("tick should succeed");

    assert!(h.store.record("alice", "evt-1").is_none(), "active reminder follows the event");
    assert!(h.store.event("alice", "evt-1").is_none());
    assert!(h.gateway.sent().is_empty(), "cancelled event must never fire");
}

#[tokio::test]
async fn sent_reminder_is_not_recalled_when_event_disappears() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.service.run_tick().await.expect("tick should succeed");

    h.calendar.set_events(vec![]);
    h.clock.advance(Duration::minutes(1));
    h.service.run_tick().await.expect("tick should succeed");

    assert!(h.store.event("alice", "evt-1").is_none(), "event row follows the calendar");
    let record = h.store.record("alice", "evt-1").expect("record should survive");
    assert_eq!(record.status, ReminderStatus::Sent, "delivered reminders are not recalled");
}

#[tokio::test]
async fn moved_event_keeps_pending_fire_time_current() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);
    h.gateway.set_fail_sends(true);
    h.service.run_tick().await.expect("tick should succeed");

    // The meeting is pushed from 14:10 out to 16:00 while the record is
    // still Pending from the failed delivery.
    let moved_start = base_time() + Duration::hours(2);
    h.calendar.set_events(vec![fetched_event("evt-1", moved_start)]);
    h.gateway.set_fail_sends(false);
    h.clock.advance(Duration::minutes(1));
    h.service.run_tick().await.expect("tick should succeed");

    let record = h.store.record("alice", "evt-1").expect("record should exist");
    assert_eq!(record.status, ReminderStatus::Pending);
    assert_eq!(
        record.fire_at,
        (moved_start - Duration::minutes(15)).timestamp(),
        "fire time must track the moved start"
    );
    assert!(h.gateway.sent().is_empty(), "stale fire time must not dispatch");

    h.clock.set(moved_start - Duration::minutes(15));
    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_sent, 1);
    assert_eq!(h.gateway.sent().len(), 1);
}

#[tokio::test]
async fn retention_purge_clears_history() {
    let h = harness(vec![fetched_event("evt-1", base_time() + Duration::minutes(10))]);

    // An event two days in the past with its dismissed record, plus an
    // orphaned record whose event row is already gone.
    let old_start = base_time() - Duration::days(2);
    h.store.insert_event(observed_event("alice", "old-evt", old_start));
    let mut old_record = reminder_record("alice", "old-evt", old_start, ReminderStatus::Dismissed);
    old_record.updated_at = old_start.timestamp();
    h.store.insert_record(old_record);
    let mut ghost = reminder_record("alice", "ghost", old_start, ReminderStatus::Dismissed);
    ghost.updated_at = old_start.timestamp();
    h.store.insert_record(ghost);

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.events_purged, 1);
    assert_eq!(summary.reminders_purged, 2);

    assert!(h.store.event("alice", "old-evt").is_none());
    assert!(h.store.record("alice", "old-evt").is_none());
    assert!(h.store.record("alice", "ghost").is_none());
    assert!(h.store.record("alice", "evt-1").is_some(), "current reminders survive the purge");
    assert!(h.store.event("alice", "evt-1").is_some());
}

#[tokio::test]
async fn in_progress_event_still_fires() {
    // Started half an hour ago, ends in half an hour.
    let h = harness(vec![fetched_event("evt-1", base_time() - Duration::minutes(30))]);

    let summary = h.service.run_tick().await.expect("tick should succeed");
    assert_eq!(summary.reminders_sent, 1);
    assert_eq!(
        h.store.record("alice", "evt-1").expect("record should exist").status,
        ReminderStatus::Sent
    );
}
