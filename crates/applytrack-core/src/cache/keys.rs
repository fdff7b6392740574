//! Cache keys and the signal -> key mapping table.

use std::fmt;

use crate::domain::{Signal, UserId};

/// A key (or key family) to evict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Exact(String),
    Prefix(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Exact(k) => f.write_str(k),
            CacheKey::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

pub fn analytics_prefix(user: UserId) -> String {
    format!("analytics:{user}:")
}

pub fn analytics_key(user: UserId, report: &str) -> String {
    format!("{}{report}", analytics_prefix(user))
}

pub fn profile_key(user: UserId) -> String {
    format!("profile:{user}")
}

pub fn schedule_key(user: UserId) -> String {
    format!("schedule:{user}:entries")
}

pub fn history_key(user: UserId) -> String {
    format!("schedule:{user}:history")
}

/// Static mapping table: which cache keys a signal invalidates.
pub fn keys_for(signal: &Signal) -> Vec<CacheKey> {
    let user = signal.user();
    match signal {
        Signal::RecordsMoved { .. }
        | Signal::RecordsDeleted { .. }
        | Signal::ApplicationsChanged { .. } => vec![CacheKey::Prefix(analytics_prefix(user))],
        Signal::ProfileChanged { .. }
        | Signal::SkillsChanged { .. }
        | Signal::ExperienceChanged { .. }
        | Signal::EducationChanged { .. } => vec![CacheKey::Exact(profile_key(user))],
        Signal::ScheduleChanged { .. } => vec![
            CacheKey::Exact(schedule_key(user)),
            CacheKey::Exact(history_key(user)),
        ],
    }
}
