use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chime_core::{EventRepository, ReminderRepository, UserRepository};
use chime_domain::{
    ObservedEvent, ReminderRecord, ReminderStatus, Result as DomainResult, User, UserStatus,
};
use chrono::{DateTime, Utc};

type Key = (String, String);

/// In-memory implementation of all three store ports.
///
/// One instance backs users, events and reminder records together so the
/// cross-table purge behaves like the real database. Clones share state;
/// tests keep one handle for seeding and inspection and hand clones to
/// the services.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    events: Arc<Mutex<HashMap<Key, ObservedEvent>>>,
    records: Arc<Mutex<HashMap<Key, ReminderRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user without going through the service layer.
    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.id.clone(), user);
    }

    /// Seed an observed event directly.
    pub fn insert_event(&self, event: ObservedEvent) {
        self.events
            .lock()
            .unwrap()
            .insert((event.user_id.clone(), event.uid.clone()), event);
    }

    /// Seed a reminder record directly.
    pub fn insert_record(&self, record: ReminderRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.user_id.clone(), record.event_uid.clone()), record);
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.users.lock().unwrap().get(id).cloned()
    }

    pub fn event(&self, user_id: &str, uid: &str) -> Option<ObservedEvent> {
        self.events
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), uid.to_string()))
            .cloned()
    }

    pub fn record(&self, user_id: &str, event_uid: &str) -> Option<ReminderRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), event_uid.to_string()))
            .cloned()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn save_user(&self, user: User) -> DomainResult<()> {
        self.users.lock().unwrap().insert(user.id.clone(), user);
        Ok(())
    }

    async fn find_user(&self, id: &str) -> DomainResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn list_active_users(&self) -> DomainResult<Vec<User>> {
        let mut active: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.status == UserStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn set_status(&self, id: &str, status: UserStatus) -> DomainResult<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(id) {
            user.status = status;
            user.updated_at = Utc::now().timestamp();
        }
        Ok(())
    }

    async fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(id) {
            user.last_synced_at = Some(at.timestamp());
        }
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> DomainResult<()> {
        self.users.lock().unwrap().remove(id);
        // Foreign keys cascade in the real store
        self.events.lock().unwrap().retain(|(uid, _), _| uid != id);
        self.records.lock().unwrap().retain(|(uid, _), _| uid != id);
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn upsert_event(&self, event: ObservedEvent) -> DomainResult<()> {
        self.events
            .lock()
            .unwrap()
            .insert((event.user_id.clone(), event.uid.clone()), event);
        Ok(())
    }

    async fn find_event(&self, user_id: &str, uid: &str) -> DomainResult<Option<ObservedEvent>> {
        Ok(self.event(user_id, uid))
    }

    async fn list_upcoming_events(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> DomainResult<Vec<ObservedEvent>> {
        let mut upcoming: Vec<ObservedEvent> = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id && e.starts_at > after.timestamp())
            .cloned()
            .collect();
        upcoming.sort_by_key(|e| e.starts_at);
        Ok(upcoming)
    }

    async fn delete_event(&self, user_id: &str, uid: &str) -> DomainResult<()> {
        self.events
            .lock()
            .unwrap()
            .remove(&(user_id.to_string(), uid.to_string()));
        Ok(())
    }

    async fn purge_events_ending_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|_, e| e.ends_at >= cutoff.timestamp());
        Ok(before - events.len())
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn create_pending(&self, record: ReminderRecord) -> DomainResult<bool> {
        let mut records = self.records.lock().unwrap();
        let key = (record.user_id.clone(), record.event_uid.clone());
        match records.get_mut(&key) {
            None => {
                records.insert(key, record);
                Ok(true)
            }
            Some(existing) if existing.status == ReminderStatus::Pending => {
                existing.fire_at = record.fire_at;
                existing.updated_at = record.updated_at;
                Ok(false)
            }
            Some(_) => Ok(false),
        }
    }

    async fn refresh_pending(
        &self,
        user_id: &str,
        event_uid: &str,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        let key = (user_id.to_string(), event_uid.to_string());
        if let Some(record) = records.get_mut(&key) {
            if record.status == ReminderStatus::Pending {
                record.fire_at = fire_at.timestamp();
                record.updated_at = at.timestamp();
            }
        }
        Ok(())
    }

    async fn find_record(
        &self,
        user_id: &str,
        event_uid: &str,
    ) -> DomainResult<Option<ReminderRecord>> {
        Ok(self.record(user_id, event_uid))
    }

    async fn due_reminders(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<ReminderRecord>> {
        let ts = now.timestamp();
        let mut due: Vec<ReminderRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match r.status {
                ReminderStatus::Pending => r.fire_at <= ts,
                ReminderStatus::Snoozed => r.snooze_until.is_some_and(|s| s <= ts),
                _ => false,
            })
            .cloned()
            .collect();
        due.sort_by_key(|r| r.fire_at);
        Ok(due)
    }

    async fn transition_sent(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut records = self.records.lock().unwrap();
        let key = (user_id.to_string(), event_uid.to_string());
        match records.get_mut(&key) {
            Some(r) if matches!(r.status, ReminderStatus::Pending | ReminderStatus::Snoozed) => {
                r.status = ReminderStatus::Sent;
                r.last_callback_id = Some(callback_id.to_string());
                r.snooze_until = None;
                r.updated_at = at.timestamp();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_snoozed(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut records = self.records.lock().unwrap();
        let key = (user_id.to_string(), event_uid.to_string());
        match records.get_mut(&key) {
            Some(r)
                if r.status == ReminderStatus::Sent
                    && r.last_callback_id.as_deref() == Some(callback_id) =>
            {
                r.status = ReminderStatus::Snoozed;
                r.snooze_until = Some(until.timestamp());
                r.updated_at = at.timestamp();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_dismissed(
        &self,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut records = self.records.lock().unwrap();
        let key = (user_id.to_string(), event_uid.to_string());
        match records.get_mut(&key) {
            Some(r)
                if matches!(r.status, ReminderStatus::Sent | ReminderStatus::Snoozed)
                    && r.last_callback_id.as_deref() == Some(callback_id) =>
            {
                r.status = ReminderStatus::Dismissed;
                r.updated_at = at.timestamp();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_active(&self, user_id: &str, event_uid: &str) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        let key = (user_id.to_string(), event_uid.to_string());
        if let Some(r) = records.get(&key) {
            if matches!(r.status, ReminderStatus::Pending | ReminderStatus::Snoozed) {
                records.remove(&key);
            }
        }
        Ok(())
    }

    async fn purge_stale_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let events = self.events.lock().unwrap();
        let mut records = self.records.lock().unwrap();
        let ts = cutoff.timestamp();
        let before = records.len();
        records.retain(|key, r| match events.get(key) {
            Some(event) => event.ends_at >= ts,
            None => r.updated_at >= ts,
        });
        Ok(before - records.len())
    }
}
