//! TrackerConfig - キャッシュ TTL などの設定
//!
//! 全フィールドに既定値があり、JSON では必要なものだけ上書きします。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::TrackerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub analytics_ttl_ms: u64,
    pub profile_ttl_ms: u64,
    pub schedule_ttl_ms: u64,

    /// Days without a stage change before a waiting record counts as stale.
    pub stale_after_days: u32,

    /// Capacity of the change-notification channel.
    pub change_feed_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            analytics_ttl_ms: 5 * 60 * 1000,
            profile_ttl_ms: 10 * 60 * 1000,
            schedule_ttl_ms: 60 * 1000,
            stale_after_days: 14,
            change_feed_buffer: 256,
        }
    }
}

impl TrackerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, TrackerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Storage(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn analytics_ttl(&self) -> Duration {
        Duration::from_millis(self.analytics_ttl_ms)
    }

    pub fn profile_ttl(&self) -> Duration {
        Duration::from_millis(self.profile_ttl_ms)
    }

    pub fn schedule_ttl(&self) -> Duration {
        Duration::from_millis(self.schedule_ttl_ms)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.stale_after_days))
    }
}
