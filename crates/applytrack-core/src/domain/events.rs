//! Events - ドメイン変更シグナル
//!
//! Signals name *what* changed. Which cache keys that touches is decided by
//! the invalidation bus, not by the publisher.

use serde::{Deserialize, Serialize};

use super::ids::{RecordId, UserId};

/// Domain-change notification routed through the invalidation bus.
///
/// Local mutations and cross-tab/realtime notifications produce the same
/// values; the bus does not track origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// One or more records changed stage (confirmed optimistic move).
    RecordsMoved { user: UserId, records: Vec<RecordId> },

    /// Records were deleted.
    RecordsDeleted { user: UserId, records: Vec<RecordId> },

    /// The application set changed in some other way (insert, remote edit).
    ApplicationsChanged { user: UserId },

    ProfileChanged { user: UserId },
    SkillsChanged { user: UserId },
    ExperienceChanged { user: UserId },
    EducationChanged { user: UserId },

    /// Schedule entries or submission history changed.
    ScheduleChanged { user: UserId },
}

/// Discriminant of [`Signal`] used as a subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    RecordsMoved,
    RecordsDeleted,
    ApplicationsChanged,
    ProfileChanged,
    SkillsChanged,
    ExperienceChanged,
    EducationChanged,
    ScheduleChanged,
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::RecordsMoved { .. } => SignalKind::RecordsMoved,
            Signal::RecordsDeleted { .. } => SignalKind::RecordsDeleted,
            Signal::ApplicationsChanged { .. } => SignalKind::ApplicationsChanged,
            Signal::ProfileChanged { .. } => SignalKind::ProfileChanged,
            Signal::SkillsChanged { .. } => SignalKind::SkillsChanged,
            Signal::ExperienceChanged { .. } => SignalKind::ExperienceChanged,
            Signal::EducationChanged { .. } => SignalKind::EducationChanged,
            Signal::ScheduleChanged { .. } => SignalKind::ScheduleChanged,
        }
    }

    /// The user whose data changed.
    pub fn user(&self) -> UserId {
        match self {
            Signal::RecordsMoved { user, .. }
            | Signal::RecordsDeleted { user, .. }
            | Signal::ApplicationsChanged { user }
            | Signal::ProfileChanged { user }
            | Signal::SkillsChanged { user }
            | Signal::ExperienceChanged { user }
            | Signal::EducationChanged { user }
            | Signal::ScheduleChanged { user } => *user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_tagged() {
        let s = Signal::SkillsChanged { user: UserId::new(5) };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["signal"], "skills_changed");
        assert_eq!(s.kind(), SignalKind::SkillsChanged);
        assert_eq!(s.user(), UserId::new(5));
    }
}
