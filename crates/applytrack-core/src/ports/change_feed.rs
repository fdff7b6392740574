//! Change feed contract - realtime / cross-tab の変更通知
//!
//! 転送プロトコルは扱いません。ここで定義するのはコールバックで届く
//! 通知の形だけです。

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Kind of row change reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

/// One change notification: `{table, eventType, recordId}` plus the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub table: String,
    pub event_type: ChangeEventType,

    /// Row id as delivered by the transport (not necessarily a ULID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    pub user_id: UserId,
}

impl ChangeNotification {
    pub fn new(table: impl Into<String>, event_type: ChangeEventType, user_id: UserId) -> Self {
        Self {
            table: table.into(),
            event_type,
            record_id: None,
            user_id,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_wire_shape() {
        let n = ChangeNotification::new("job_applications", ChangeEventType::Update, UserId::new(1))
            .with_record_id("42");
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["event_type"], "UPDATE");
        assert_eq!(v["record_id"], "42");
    }
}
