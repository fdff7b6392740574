//! KeyValueStore port - ローカル永続 KV（TTL なし）
//!
//! セッションをまたいで保持したい小さな JSON（予定・提出履歴）用。

use crate::domain::TrackerError;

/// KeyValueStore は JSON 値を key で保存する
///
/// # 設計原則
/// - 同期 API（ローカルストレージ相当）
/// - TTL なし: 有効期限はキャッシュ層が持つ
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, TrackerError>;

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), TrackerError>;

    fn remove(&self, key: &str) -> Result<(), TrackerError>;
}
