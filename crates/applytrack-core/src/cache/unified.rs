//! Unified domain cache: one fetch-all entry per scope, many selectors.
//!
//! Every selector projects from the same cached snapshot, so two views of
//! one scope can never disagree about freshness. Invalidating the scope key
//! invalidates all of them at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::store::CacheStore;
use crate::domain::TrackerError;
use crate::ports::Clock;

/// Fetch-all collaborator behind a [`UnifiedDomainCache`].
#[async_trait]
pub trait DomainFetcher: Send + Sync {
    type Scope: Send + Sync;
    type Snapshot: Clone + Send + Sync + 'static;

    /// Cache key backing every view of `scope`.
    fn cache_key(&self, scope: &Self::Scope) -> String;

    async fn fetch_all(&self, scope: &Self::Scope) -> Result<Self::Snapshot, TrackerError>;
}

pub struct UnifiedDomainCache<F: DomainFetcher> {
    store: Arc<CacheStore<F::Snapshot>>,
    fetcher: F,
    ttl: Duration,
    /// Per-key gates so concurrent misses share one fetch.
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<F: DomainFetcher> UnifiedDomainCache<F> {
    pub fn new(name: &'static str, fetcher: F, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(CacheStore::new(name, clock)),
            fetcher,
            ttl,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The backing store (register it with the invalidation bus).
    pub fn store(&self) -> Arc<CacheStore<F::Snapshot>> {
        Arc::clone(&self.store)
    }

    /// Cached snapshot for `scope`, fetching on miss.
    ///
    /// A miss is never surfaced; only a failed fetch is.
    pub async fn fetch_unified(&self, scope: &F::Scope) -> Result<F::Snapshot, TrackerError> {
        let key = self.fetcher.cache_key(scope);
        if let Some(hit) = self.store.get(&key) {
            return Ok(hit);
        }

        let gate = Arc::clone(self.inflight.lock().entry(key.clone()).or_default());
        let result = {
            let _turn = gate.lock().await;
            // another caller may have filled it while we waited
            match self.store.peek(&key) {
                Some(entry) if entry.is_fresh(self.store.now_millis()) => Ok(entry.data),
                _ => self.fetch_and_fill(scope, &key).await,
            }
        };

        let mut inflight = self.inflight.lock();
        if let Some(existing) = inflight.get(&key)
            && Arc::strong_count(existing) <= 2
        {
            inflight.remove(&key);
        }
        result
    }

    /// Fetch and project in one call.
    pub async fn select<R>(
        &self,
        scope: &F::Scope,
        selector: impl FnOnce(&F::Snapshot) -> R,
    ) -> Result<R, TrackerError> {
        let snapshot = self.fetch_unified(scope).await?;
        Ok(selector(&snapshot))
    }

    /// Cached snapshot without fetching.
    pub fn cached(&self, scope: &F::Scope) -> Option<F::Snapshot> {
        self.store.get(&self.fetcher.cache_key(scope))
    }

    pub fn invalidate(&self, scope: &F::Scope) -> bool {
        self.store.invalidate(&self.fetcher.cache_key(scope))
    }

    async fn fetch_and_fill(
        &self,
        scope: &F::Scope,
        key: &str,
    ) -> Result<F::Snapshot, TrackerError> {
        let ticket = self.store.begin_fill(key);
        debug!(cache = self.store.name(), key, "fetching unified snapshot");
        let snapshot = self.fetcher.fetch_all(scope).await?;
        self.store.complete_fill(ticket, snapshot.clone(), self.ttl, None);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Snapshot {
        header: String,
        items: Vec<(String, u32)>,
    }

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        delay: Option<std::time::Duration>,
    }

    #[async_trait]
    impl DomainFetcher for CountingFetcher {
        type Scope = String;
        type Snapshot = Snapshot;

        fn cache_key(&self, scope: &String) -> String {
            format!("unified:{scope}")
        }

        async fn fetch_all(&self, scope: &String) -> Result<Snapshot, TrackerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(Snapshot {
                header: format!("{scope}#{n}"),
                items: vec![("rust".into(), 1), ("go".into(), 2)],
            })
        }
    }

    fn cache(
        delay: Option<std::time::Duration>,
    ) -> (UnifiedDomainCache<CountingFetcher>, Arc<AtomicUsize>, FixedClock) {
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let cache = UnifiedDomainCache::new(
            "unified",
            CountingFetcher {
                calls: calls.clone(),
                delay,
            },
            Duration::from_secs(30),
            Arc::new(clock.clone()),
        );
        (cache, calls, clock)
    }

    #[tokio::test]
    async fn selectors_share_one_fetch() {
        let (cache, calls, _) = cache(None);
        let scope = "u1".to_string();

        let header = cache.select(&scope, |s| s.header.clone()).await.unwrap();
        let count = cache.select(&scope, |s| s.items.len()).await.unwrap();

        assert_eq!(header, "u1#1");
        assert_eq!(count, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidating_scope_refreshes_every_view() {
        let (cache, calls, _) = cache(None);
        let scope = "u1".to_string();
        cache.fetch_unified(&scope).await.unwrap();

        assert!(cache.invalidate(&scope));
        assert!(cache.cached(&scope).is_none());

        let header = cache.select(&scope, |s| s.header.clone()).await.unwrap();
        assert_eq!(header, "u1#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_snapshot_is_refetched() {
        let (cache, calls, clock) = cache(None);
        let scope = "u1".to_string();
        cache.fetch_unified(&scope).await.unwrap();

        clock.advance(ChronoDuration::seconds(31));
        let snapshot = cache.fetch_unified(&scope).await.unwrap();
        assert_eq!(snapshot.header, "u1#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_are_coalesced() {
        let (cache, calls, _) = cache(Some(std::time::Duration::from_millis(20)));
        let cache = Arc::new(cache);
        let scope = "u1".to_string();

        let a = {
            let cache = cache.clone();
            let scope = scope.clone();
            tokio::spawn(async move { cache.fetch_unified(&scope).await.unwrap() })
        };
        let b = {
            let cache = cache.clone();
            let scope = scope.clone();
            tokio::spawn(async move { cache.fetch_unified(&scope).await.unwrap() })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
