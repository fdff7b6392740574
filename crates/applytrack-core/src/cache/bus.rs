//! Invalidation bus: signal -> cache eviction + listener fan-out.
//!
//! Design:
//! - The signal -> key table is static (`keys::keys_for`).
//! - Eviction runs synchronously inside `publish`, before any listener is
//!   called, so a listener that refetches always misses.
//! - Listeners are called outside the lock; a listener may publish again.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::keys::keys_for;
use super::store::Invalidate;
use crate::domain::{Signal, SignalKind};

type Listener = Arc<dyn Fn(&Signal) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    /// `None` = every signal.
    entries: HashMap<u64, (Option<SignalKind>, Listener)>,
}

/// Publish/subscribe router that evicts cache keys for domain signals.
///
/// Local mutations and cross-tab/realtime notifications both enter through
/// [`InvalidationBus::publish`].
#[derive(Default)]
pub struct InvalidationBus {
    targets: RwLock<Vec<Arc<dyn Invalidate>>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cache store whose keys this bus may evict.
    pub fn register(&self, target: Arc<dyn Invalidate>) {
        self.targets.write().push(target);
    }

    /// Evict mapped keys from every registered store, then notify listeners.
    ///
    /// Returns the number of entries actually removed; publishing a signal
    /// whose keys are already absent removes nothing and is not an error.
    pub fn publish(&self, signal: &Signal) -> usize {
        let keys = keys_for(signal);
        let mut evicted = 0;
        {
            let targets = self.targets.read();
            for key in &keys {
                for target in targets.iter() {
                    evicted += target.evict(key);
                }
            }
        }
        debug!(signal = ?signal.kind(), user = %signal.user(), evicted, "signal published");

        let kind = signal.kind();
        let listeners: Vec<Listener> = {
            let listeners = self.listeners.lock();
            let mut matching: Vec<(u64, Listener)> = listeners
                .entries
                .iter()
                .filter(|(_, (filter, _))| filter.is_none_or(|k| k == kind))
                .map(|(id, (_, listener))| (*id, Arc::clone(listener)))
                .collect();
            // subscription order
            matching.sort_by_key(|(id, _)| *id);
            matching.into_iter().map(|(_, listener)| listener).collect()
        };
        for listener in listeners {
            listener(signal);
        }
        evicted
    }

    /// Listen for one kind of signal.
    pub fn subscribe<F>(&self, kind: SignalKind, listener: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.add_listener(Some(kind), Arc::new(listener))
    }

    /// Listen for every signal (e.g. a UI refetch hook).
    pub fn subscribe_all<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.add_listener(None, Arc::new(listener))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// Clear every registered store (session end).
    pub fn clear_all(&self) {
        for target in self.targets.read().iter() {
            target.clear();
        }
    }

    fn add_listener(&self, kind: Option<SignalKind>, listener: Listener) -> Subscription {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, (kind, listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }
}

/// Handle returned by `subscribe`; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::{analytics_key, profile_key};
    use crate::cache::CacheStore;
    use crate::domain::{RecordId, UserId};
    use crate::ports::SystemClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    fn setup() -> (InvalidationBus, Arc<CacheStore<u32>>, Arc<CacheStore<String>>) {
        let bus = InvalidationBus::new();
        let analytics = Arc::new(CacheStore::new("analytics", Arc::new(SystemClock)));
        let profile = Arc::new(CacheStore::new("profile", Arc::new(SystemClock)));
        bus.register(analytics.clone());
        bus.register(profile.clone());
        (bus, analytics, profile)
    }

    #[test]
    fn publish_evicts_mapped_keys_across_stores() {
        let (bus, analytics, profile) = setup();
        let user = UserId::new(1);
        analytics.set(&analytics_key(user, "pipeline"), 1, TTL);
        analytics.set(&analytics_key(user, "weekly"), 2, TTL);
        profile.set(&profile_key(user), "me".into(), TTL);

        let evicted = bus.publish(&Signal::RecordsMoved {
            user,
            records: vec![RecordId::new(42)],
        });
        assert_eq!(evicted, 2);
        assert!(analytics.is_empty());
        assert_eq!(profile.len(), 1);

        assert_eq!(bus.publish(&Signal::SkillsChanged { user }), 1);
        assert!(profile.is_empty());
    }

    #[test]
    fn republishing_is_idempotent() {
        let (bus, analytics, _) = setup();
        let user = UserId::new(1);
        analytics.set(&analytics_key(user, "pipeline"), 1, TTL);
        let signal = Signal::ApplicationsChanged { user };

        assert_eq!(bus.publish(&signal), 1);
        assert_eq!(bus.publish(&signal), 0);
        assert!(analytics.is_empty());
    }

    #[test]
    fn listeners_run_after_eviction() {
        let (bus, analytics, _) = setup();
        let user = UserId::new(1);
        let key = analytics_key(user, "pipeline");
        analytics.set(&key, 1, TTL);

        let seen_after_eviction = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let analytics = analytics.clone();
            let seen = seen_after_eviction.clone();
            bus.subscribe(SignalKind::ApplicationsChanged, move |_| {
                if analytics.get(&key).is_none() {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        bus.publish(&Signal::ApplicationsChanged { user });
        assert_eq!(seen_after_eviction.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_filters_by_kind_and_unsubscribes_on_drop() {
        let bus = InvalidationBus::new();
        let user = UserId::new(1);
        let profile_hits = Arc::new(AtomicUsize::new(0));
        let all_hits = Arc::new(AtomicUsize::new(0));

        let profile_sub = {
            let hits = profile_hits.clone();
            bus.subscribe(SignalKind::ProfileChanged, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _all_sub = {
            let hits = all_hits.clone();
            bus.subscribe_all(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        bus.publish(&Signal::ProfileChanged { user });
        bus.publish(&Signal::ScheduleChanged { user });
        assert_eq!(profile_hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 2);

        profile_sub.unsubscribe();
        assert_eq!(bus.listener_count(), 1);
        bus.publish(&Signal::ProfileChanged { user });
        assert_eq!(profile_hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn listener_may_publish_reentrantly() {
        let bus = Arc::new(InvalidationBus::new());
        let user = UserId::new(1);
        let schedule_hits = Arc::new(AtomicUsize::new(0));

        let _chain = {
            let weak = Arc::downgrade(&bus);
            bus.subscribe(SignalKind::ProfileChanged, move |signal| {
                if let Some(bus) = weak.upgrade() {
                    bus.publish(&Signal::ScheduleChanged { user: signal.user() });
                }
            })
        };
        let _count = {
            let hits = schedule_hits.clone();
            bus.subscribe(SignalKind::ScheduleChanged, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        bus.publish(&Signal::ProfileChanged { user });
        assert_eq!(schedule_hits.load(Ordering::SeqCst), 1);
    }
}
