//! Status - セッションの状態ビュー（CLI / デバッグ表示用）

use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, Invalidate};
use crate::domain::UserId;
use crate::pipeline::PipelineStats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCacheStats {
    pub name: String,
    #[serde(flatten)]
    pub stats: CacheStats,
}

impl NamedCacheStats {
    pub fn of(cache: &dyn Invalidate) -> Self {
        Self {
            name: cache.cache_name().to_string(),
            stats: cache.cache_stats(),
        }
    }
}

/// Snapshot of one session, cheap enough to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub user: UserId,
    pub records: usize,
    pub revision: u64,
    pub generation: u64,
    /// Records held by an unresolved mutation.
    pub in_flight: usize,
    pub needs_refresh: bool,
    pub listeners: usize,
    pub change_feed_running: bool,
    pub stats: PipelineStats,
    pub caches: Vec<NamedCacheStats>,
}
