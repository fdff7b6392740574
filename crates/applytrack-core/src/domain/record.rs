//! Application record: one tracked job application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{RecordId, UserId};
use super::stage::Stage;

/// A job application tracked through the pipeline.
///
/// Design:
/// - `stage` is the single current stage (exactly one per record).
/// - Stage changes go through [`ApplicationRecord::enter_stage`] so
///   `stage_changed_at` never moves backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub company: String,
    pub position: String,

    #[serde(default)]
    pub stage: Stage,

    pub stage_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn new(
        id: RecordId,
        user_id: UserId,
        company: impl Into<String>,
        position: impl Into<String>,
        stage: Stage,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            company: company.into(),
            position: position.into(),
            stage,
            stage_changed_at: now,
            created_at: now,
        }
    }

    /// Move into `stage`, stamping `stage_changed_at` with `max(now, previous)`.
    ///
    /// Returns false (and leaves the record untouched) when already in `stage`.
    pub fn enter_stage(&mut self, stage: Stage, now: DateTime<Utc>) -> bool {
        if self.stage == stage {
            return false;
        }
        self.stage = stage;
        self.stage_changed_at = self.stage_changed_at.max(now);
        true
    }
}

/// Partial update sent to the persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_changed_at: Option<DateTime<Utc>>,
}

impl ApplicationPatch {
    pub fn stage(stage: Stage, at: DateTime<Utc>) -> Self {
        Self {
            stage: Some(stage),
            stage_changed_at: Some(at),
        }
    }

    /// Apply the patch to a record (used by in-memory persistence).
    pub fn apply_to(&self, record: &mut ApplicationRecord) {
        if let Some(stage) = self.stage {
            record.stage = stage;
        }
        if let Some(at) = self.stage_changed_at {
            record.stage_changed_at = at;
        }
    }
}
