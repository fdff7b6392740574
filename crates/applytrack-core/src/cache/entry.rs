//! Cache entry: data + timestamp + ttl + optional version tag.

use serde::{Deserialize, Serialize};

/// One cached value.
///
/// Entries are replace-only: a newer fetch overwrites the whole entry, and
/// nothing mutates `data` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,

    /// Insertion time, milliseconds since the Unix epoch.
    pub timestamp: i64,

    pub ttl_ms: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, timestamp: i64, ttl_ms: i64) -> Self {
        Self {
            data,
            timestamp,
            ttl_ms,
            version: None,
        }
    }

    /// Strictly younger than `ttl_ms`.
    pub fn is_fresh(&self, now: i64) -> bool {
        now.saturating_sub(self.timestamp) < self.ttl_ms
    }

    /// Fresh, and tagged with `required_version` when one is supplied.
    pub fn is_valid(&self, now: i64, required_version: Option<&str>) -> bool {
        if !self.is_fresh(now) {
            return false;
        }
        match required_version {
            None => true,
            Some(required) => self.version.as_deref() == Some(required),
        }
    }
}
