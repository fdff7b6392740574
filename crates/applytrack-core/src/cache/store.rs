//! TTL + version cache store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entry::CacheEntry;
use super::keys::CacheKey;
use crate::ports::Clock;

/// Counters for one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped on access because they were stale (TTL or version).
    pub expirations: u64,
    pub invalidations: u64,
    pub entries: usize,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    stats: CacheStats,
    /// key -> ticket of the fill in progress. Invalidating the key voids
    /// the ticket, so a fetch started before the invalidation can't land.
    fills: HashMap<String, u64>,
    next_fill: u64,
}

/// Handle for one read-through fill of one key.
#[derive(Debug)]
pub struct FillTicket {
    key: String,
    id: u64,
}

/// Key -> (data, timestamp, version) map with lazy TTL expiry.
///
/// - `get` returns `None` both for absent and for stale entries; stale
///   entries are dropped on that access (no background sweep).
/// - `set` always overwrites.
/// - Invalidating an absent key is a no-op.
pub struct CacheStore<T> {
    name: &'static str,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<T>>,
}

impl<T: Clone + Send> CacheStore<T> {
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            clock,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                stats: CacheStats::default(),
                fills: HashMap::new(),
                next_fill: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_versioned(key, None)
    }

    /// Like [`CacheStore::get`], but an entry whose version tag differs from
    /// `current_version` counts as stale.
    pub fn get_versioned(&self, key: &str, current_version: Option<&str>) -> Option<T> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        let valid = match state.entries.get(key) {
            None => {
                state.stats.misses += 1;
                debug!(cache = self.name, key, "cache miss");
                return None;
            }
            Some(entry) => entry.is_valid(now, current_version),
        };

        if !valid {
            state.entries.remove(key);
            state.stats.misses += 1;
            state.stats.expirations += 1;
            debug!(cache = self.name, key, "cache entry stale, dropped");
            return None;
        }

        state.stats.hits += 1;
        state.entries.get(key).map(|entry| entry.data.clone())
    }

    /// Raw entry (fresh or not), without touching counters.
    pub fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn set(&self, key: &str, data: T, ttl: Duration) {
        self.set_versioned(key, data, ttl, None);
    }

    pub fn set_versioned(&self, key: &str, data: T, ttl: Duration, version: Option<String>) {
        let entry = self.entry(data, ttl, version);
        self.state.lock().entries.insert(key.to_string(), entry);
    }

    /// Mark `key` as being filled from the source of truth.
    pub fn begin_fill(&self, key: &str) -> FillTicket {
        let mut state = self.state.lock();
        state.next_fill += 1;
        let id = state.next_fill;
        state.fills.insert(key.to_string(), id);
        FillTicket {
            key: key.to_string(),
            id,
        }
    }

    /// Store the result of a fill unless its key was invalidated (or a newer
    /// fill of the same key started) after [`CacheStore::begin_fill`].
    ///
    /// Returns false and drops `data` in that case.
    pub fn complete_fill(
        &self,
        ticket: FillTicket,
        data: T,
        ttl: Duration,
        version: Option<String>,
    ) -> bool {
        let entry = self.entry(data, ttl, version);
        let mut state = self.state.lock();
        if state.fills.get(&ticket.key) != Some(&ticket.id) {
            debug!(
                cache = self.name,
                key = %ticket.key,
                "discarding fetch result invalidated mid-flight"
            );
            return false;
        }
        state.fills.remove(&ticket.key);
        state.entries.insert(ticket.key, entry);
        true
    }

    pub(crate) fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Remove one key. Returns whether an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.fills.remove(key);
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.stats.invalidations += 1;
            debug!(cache = self.name, key, "invalidated");
        }
        removed
    }

    /// Remove every key starting with `prefix`, or everything when `None`.
    pub fn invalidate_all(&self, prefix: Option<&str>) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        match prefix {
            Some(prefix) => {
                state.entries.retain(|key, _| !key.starts_with(prefix));
                state.fills.retain(|key, _| !key.starts_with(prefix));
            }
            None => {
                state.entries.clear();
                state.fills.clear();
            }
        }
        let removed = before - state.entries.len();
        state.stats.invalidations += removed as u64;
        if removed > 0 {
            debug!(cache = self.name, prefix = prefix.unwrap_or("*"), removed, "invalidated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }

    fn entry(&self, data: T, ttl: Duration, version: Option<String>) -> CacheEntry<T> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
            ttl_ms,
            version,
        }
    }
}

/// Eviction target for the invalidation bus.
///
/// Object-safe so one bus can evict across stores holding different
/// value types.
pub trait Invalidate: Send + Sync {
    fn cache_name(&self) -> &str;

    fn evict(&self, key: &CacheKey) -> usize;

    fn clear(&self);

    fn cache_stats(&self) -> CacheStats;
}

impl<T: Clone + Send> Invalidate for CacheStore<T> {
    fn cache_name(&self) -> &str {
        self.name
    }

    fn evict(&self, key: &CacheKey) -> usize {
        match key {
            CacheKey::Exact(k) => usize::from(self.invalidate(k)),
            CacheKey::Prefix(p) => self.invalidate_all(Some(p)),
        }
    }

    fn clear(&self) {
        self.invalidate_all(None);
    }

    fn cache_stats(&self) -> CacheStats {
        self.stats()
    }
}
