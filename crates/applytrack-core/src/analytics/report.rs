//! Pipeline analytics report (pure derivation).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ApplicationRecord, Stage};
use crate::pipeline::{PipelineStats, compute_stats};

/// Conversion rates and staleness derived from the record set.
///
/// Rates are fractions in `0.0..=1.0` relative to every record that was
/// sent out (cumulative `applied` plus `rejected`); all zero when nothing
/// was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub stats: PipelineStats,
    pub response_rate: f64,
    pub interview_rate: f64,
    pub offer_rate: f64,
    pub rejection_rate: f64,

    /// Records waiting on the company (applied, phone screen, interview)
    /// whose stage has not changed for `stale_after`.
    pub stale: usize,

    pub generated_at: DateTime<Utc>,
}

fn awaiting_response(stage: Stage) -> bool {
    matches!(stage, Stage::Applied | Stage::PhoneScreen | Stage::Interview)
}

fn rate(count: usize, sent: usize) -> f64 {
    if sent == 0 {
        0.0
    } else {
        count as f64 / sent as f64
    }
}

pub fn build_report(
    records: &[ApplicationRecord],
    now: DateTime<Utc>,
    stale_after: Duration,
) -> AnalyticsReport {
    let stats = compute_stats(records);
    let cumulative = &stats.cumulative;
    let sent = cumulative.applied + cumulative.rejected;

    let stale = records
        .iter()
        .filter(|r| awaiting_response(r.stage) && now - r.stage_changed_at >= stale_after)
        .count();

    AnalyticsReport {
        response_rate: rate(cumulative.phone_screen + cumulative.rejected, sent),
        interview_rate: rate(cumulative.interview, sent),
        offer_rate: rate(cumulative.offer, sent),
        rejection_rate: rate(cumulative.rejected, sent),
        stale,
        generated_at: now,
        stats,
    }
}
