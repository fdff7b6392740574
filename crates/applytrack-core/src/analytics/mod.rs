//! Analytics: cached pipeline reports.
//!
//! A report is keyed per user under the `analytics:{user}:` prefix and
//! tagged with the stage store revision it was computed from. A local
//! mutation therefore invalidates it twice over: the revision moves on
//! apply, and the bus evicts the prefix on confirm.

pub mod report;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::CacheStore;
use crate::cache::keys::analytics_key;
use crate::domain::UserId;
use crate::pipeline::StageStore;
use crate::ports::Clock;

pub use report::{AnalyticsReport, build_report};

pub const PIPELINE_REPORT: &str = "pipeline";

pub struct AnalyticsService {
    user: UserId,
    store: Arc<StageStore>,
    cache: Arc<CacheStore<AnalyticsReport>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    stale_after: chrono::Duration,
}

impl AnalyticsService {
    pub fn new(
        user: UserId,
        store: Arc<StageStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            user,
            store,
            cache: Arc::new(CacheStore::new("analytics", Arc::clone(&clock))),
            clock,
            ttl,
            stale_after,
        }
    }

    /// The backing store (register it with the invalidation bus).
    pub fn cache(&self) -> Arc<CacheStore<AnalyticsReport>> {
        Arc::clone(&self.cache)
    }

    /// Cached report, recomputed when expired, evicted or out of date with
    /// the stage store.
    pub fn pipeline_report(&self) -> AnalyticsReport {
        let key = analytics_key(self.user, PIPELINE_REPORT);
        let revision = self.store.revision().to_string();
        if let Some(report) = self.cache.get_versioned(&key, Some(revision.as_str())) {
            return report;
        }

        let (records, revision) = self.store.records_at_revision();
        let report = build_report(&records, self.clock.now(), self.stale_after);
        debug!(user = %self.user, revision, "analytics report computed");
        self.cache
            .set_versioned(&key, report.clone(), self.ttl, Some(revision.to_string()));
        report
    }
}
