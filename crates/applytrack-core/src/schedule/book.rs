//! Schedule book: key-value persistence with invalidate-on-write caching.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{NewEntry, ScheduleEntry, Submission};
use crate::cache::keys::{history_key, schedule_key};
use crate::cache::{CacheStore, Invalidate, InvalidationBus};
use crate::domain::{ApplicationRecord, ScheduleId, Signal, TrackerError, UserId};
use crate::ports::{Clock, IdGenerator, KeyValueStore};

pub struct ScheduleBook {
    user: UserId,
    kv: Arc<dyn KeyValueStore>,
    entries: Arc<CacheStore<Vec<ScheduleEntry>>>,
    history: Arc<CacheStore<Vec<Submission>>>,
    bus: Arc<InvalidationBus>,
    ids: Arc<dyn IdGenerator>,
    ttl: Duration,
}

impl ScheduleBook {
    pub fn new(
        user: UserId,
        kv: Arc<dyn KeyValueStore>,
        bus: Arc<InvalidationBus>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            user,
            kv,
            entries: Arc::new(CacheStore::new("schedule", Arc::clone(&clock))),
            history: Arc::new(CacheStore::new("submission_history", clock)),
            bus,
            ids,
            ttl,
        }
    }

    /// Both backing stores, for registration with the invalidation bus.
    pub fn caches(&self) -> Vec<Arc<dyn Invalidate>> {
        vec![
            Arc::clone(&self.entries) as Arc<dyn Invalidate>,
            Arc::clone(&self.history) as Arc<dyn Invalidate>,
        ]
    }

    /// All entries ordered by due time.
    pub fn entries(&self) -> Result<Vec<ScheduleEntry>, TrackerError> {
        self.read_cached(&self.entries, &schedule_key(self.user))
    }

    /// Open entries due in `[now, now + window)`.
    pub fn upcoming(
        &self,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Result<Vec<ScheduleEntry>, TrackerError> {
        let until = now + window;
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| !e.done && e.due_at >= now && e.due_at < until)
            .collect())
    }

    pub fn add_entry(&self, draft: NewEntry) -> Result<ScheduleEntry, TrackerError> {
        let entry = ScheduleEntry {
            id: self.ids.generate_schedule_id(),
            kind: draft.kind,
            title: draft.title,
            due_at: draft.due_at,
            record: draft.record,
            done: false,
        };
        let mut entries: Vec<ScheduleEntry> = self.read_durable(&schedule_key(self.user))?;
        entries.push(entry.clone());
        entries.sort_by_key(|e| e.due_at);
        self.write(&self.entries, &schedule_key(self.user), &entries)?;
        Ok(entry)
    }

    /// Mark an entry done. Returns false if no entry has `id`.
    pub fn complete(&self, id: ScheduleId) -> Result<bool, TrackerError> {
        let key = schedule_key(self.user);
        let mut entries: Vec<ScheduleEntry> = self.read_durable(&key)?;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        entry.done = true;
        self.write(&self.entries, &key, &entries)?;
        Ok(true)
    }

    pub fn remove_entry(&self, id: ScheduleId) -> Result<bool, TrackerError> {
        let key = schedule_key(self.user);
        let mut entries: Vec<ScheduleEntry> = self.read_durable(&key)?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&self.entries, &key, &entries)?;
        Ok(true)
    }

    /// Submission history, most recent first.
    pub fn history(&self) -> Result<Vec<Submission>, TrackerError> {
        self.read_cached(&self.history, &history_key(self.user))
    }

    pub fn record_submission(
        &self,
        record: &ApplicationRecord,
        submitted_at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<Submission, TrackerError> {
        let submission = Submission {
            record: record.id,
            company: record.company.clone(),
            position: record.position.clone(),
            submitted_at,
            note,
        };
        let key = history_key(self.user);
        let mut history: Vec<Submission> = self.read_durable(&key)?;
        history.push(submission.clone());
        history.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        self.write(&self.history, &key, &history)?;
        Ok(submission)
    }

    fn read_cached<T>(&self, cache: &CacheStore<Vec<T>>, key: &str) -> Result<Vec<T>, TrackerError>
    where
        T: DeserializeOwned + Clone + Send,
    {
        if let Some(hit) = cache.get(key) {
            return Ok(hit);
        }
        let ticket = cache.begin_fill(key);
        let items: Vec<T> = self.read_durable(key)?;
        cache.complete_fill(ticket, items.clone(), self.ttl, None);
        Ok(items)
    }

    fn read_durable<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, TrackerError> {
        match self.kv.get(key)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Persist, evict the cached copy, then tell listeners.
    fn write<T>(&self, cache: &CacheStore<Vec<T>>, key: &str, items: &[T]) -> Result<(), TrackerError>
    where
        T: Serialize + Clone + Send,
    {
        self.kv.set(key, serde_json::to_value(items)?)?;
        cache.invalidate(key);
        debug!(user = %self.user, key, items = items.len(), "schedule written");
        self.bus.publish(&Signal::ScheduleChanged { user: self.user });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryKeyValueStore;
    use crate::ports::{FixedClock, UlidGenerator};
    use crate::schedule::EntryKind;
    use crate::domain::{RecordId, SignalKind, Stage};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
    }

    fn book() -> (ScheduleBook, Arc<InMemoryKeyValueStore>, Arc<InvalidationBus>) {
        let clock = FixedClock::new(t0());
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let bus = Arc::new(InvalidationBus::new());
        let book = ScheduleBook::new(
            UserId::new(5),
            kv.clone(),
            bus.clone(),
            Arc::new(UlidGenerator::new(clock.clone())),
            Arc::new(clock),
            Duration::from_secs(60),
        );
        for cache in book.caches() {
            bus.register(cache);
        }
        (book, kv, bus)
    }

    #[test]
    fn write_invalidates_cached_read() {
        let (book, _, _) = book();
        assert!(book.entries().unwrap().is_empty());

        book.add_entry(NewEntry::new(EntryKind::Interview, "Onsite", t0() + chrono::Duration::days(2)))
            .unwrap();
        assert_eq!(book.entries().unwrap().len(), 1);
    }

    #[test]
    fn entries_persist_in_key_value_store() {
        let (book, kv, _) = book();
        book.add_entry(NewEntry::new(EntryKind::Deadline, "Take-home", t0())).unwrap();

        let raw = kv.get(&schedule_key(UserId::new(5))).unwrap().unwrap();
        assert_eq!(raw[0]["title"], "Take-home");
        assert_eq!(raw[0]["kind"], "deadline");
    }

    #[test]
    fn upcoming_filters_window_and_done() {
        let (book, _, _) = book();
        let day = chrono::Duration::days(1);
        book.add_entry(NewEntry::new(EntryKind::FollowUp, "past", t0() - day)).unwrap();
        let soon = book
            .add_entry(NewEntry::new(EntryKind::Interview, "soon", t0() + day))
            .unwrap();
        book.add_entry(NewEntry::new(EntryKind::Interview, "later", t0() + day * 10)).unwrap();
        let done = book
            .add_entry(NewEntry::new(EntryKind::Other, "done", t0() + day * 2))
            .unwrap();
        assert!(book.complete(done.id).unwrap());

        let upcoming = book.upcoming(t0(), chrono::Duration::days(7)).unwrap();
        assert_eq!(upcoming, vec![soon]);
    }

    #[test]
    fn remove_unknown_entry_is_false() {
        let (book, _, _) = book();
        let entry = book.add_entry(NewEntry::new(EntryKind::Other, "x", t0())).unwrap();
        assert!(book.remove_entry(entry.id).unwrap());
        assert!(!book.remove_entry(entry.id).unwrap());
        assert!(!book.complete(entry.id).unwrap());
    }

    #[test]
    fn submission_history_is_newest_first_and_signals() {
        let (book, _, bus) = book();
        let changes = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let changes = changes.clone();
            bus.subscribe(SignalKind::ScheduleChanged, move |_| {
                changes.fetch_add(1, Ordering::SeqCst);
            })
        };
        let record = ApplicationRecord::new(RecordId::new(1), UserId::new(5), "Acme", "Dev", Stage::Applied, t0());

        book.record_submission(&record, t0(), None).unwrap();
        book.record_submission(&record, t0() + chrono::Duration::hours(1), Some("resent".into()))
            .unwrap();

        let history = book.history().unwrap();
        assert_eq!(history[0].note.as_deref(), Some("resent"));
        assert_eq!(history.len(), 2);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }
}
