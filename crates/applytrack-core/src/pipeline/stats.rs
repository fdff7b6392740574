//! Cumulative pipeline statistics.
//!
//! Always derived from the current record set; there is no incremental
//! counter state that could drift from the board.

use serde::{Deserialize, Serialize};

use crate::domain::{ApplicationRecord, Stage};

/// One counter per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub interested: usize,
    pub applied: usize,
    pub phone_screen: usize,
    pub interview: usize,
    pub offer: usize,
    pub rejected: usize,
}

impl StageCounts {
    pub fn get(&self, stage: Stage) -> usize {
        match stage {
            Stage::Interested => self.interested,
            Stage::Applied => self.applied,
            Stage::PhoneScreen => self.phone_screen,
            Stage::Interview => self.interview,
            Stage::Offer => self.offer,
            Stage::Rejected => self.rejected,
        }
    }

    fn slot(&mut self, stage: Stage) -> &mut usize {
        match stage {
            Stage::Interested => &mut self.interested,
            Stage::Applied => &mut self.applied,
            Stage::PhoneScreen => &mut self.phone_screen,
            Stage::Interview => &mut self.interview,
            Stage::Offer => &mut self.offer,
            Stage::Rejected => &mut self.rejected,
        }
    }

    pub fn increment(&mut self, stage: Stage) {
        *self.slot(stage) += 1;
    }

    pub fn total(&self) -> usize {
        Stage::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Derived read-only aggregates for the statistics panel and kanban.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// A record counts toward every stage in its progression set.
    pub cumulative: StageCounts,

    /// Size of each stage's current column.
    pub current_by_stage: StageCounts,

    pub total: usize,
}

/// Compute cumulative and current counts from a record set.
///
/// Rejected records only count toward `rejected`. Stage values that could
/// not be parsed were already folded into Interested when the record was
/// decoded.
pub fn compute_stats<'a, I>(records: I) -> PipelineStats
where
    I: IntoIterator<Item = &'a ApplicationRecord>,
{
    let mut stats = PipelineStats::default();
    for record in records {
        for stage in record.stage.progression() {
            stats.cumulative.increment(*stage);
        }
        stats.current_by_stage.increment(record.stage);
        stats.total += 1;
    }
    stats
}
