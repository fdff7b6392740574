//! Schedule - 面接予定・フォローアップ・提出履歴
//!
//! Persisted in the local key-value store; reads go through a TTL cache
//! that is invalidated on every write.

pub mod book;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, ScheduleId};

pub use book::ScheduleBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Interview,
    FollowUp,
    Deadline,
    Other,
}

/// One calendar item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleId,
    pub kind: EntryKind,
    pub title: String,
    pub due_at: DateTime<Utc>,

    /// Application this entry belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordId>,

    #[serde(default)]
    pub done: bool,
}

/// Draft of a [`ScheduleEntry`] before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub record: Option<RecordId>,
}

impl NewEntry {
    pub fn new(kind: EntryKind, title: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            title: title.into(),
            due_at,
            record: None,
        }
    }

    pub fn for_record(mut self, record: RecordId) -> Self {
        self.record = Some(record);
        self
    }
}

/// One entry of the submission history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub record: RecordId,
    pub company: String,
    pub position: String,
    pub submitted_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
