//! Aggregate generation statistics derived from job transitions.
//!
//! Counters only move on a genuine [`Transition`]; idempotent repeats never
//! reach this module because [`JobTable::transition`](crate::table::JobTable::transition)
//! returns `None` for them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::job::{JobRecord, JobStatus, Transition};
use crate::types::Timestamp;

/// Day bucket key format (UTC).
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Hour bucket key format (UTC).
pub const HOUR_KEY_FORMAT: &str = "%Y-%m-%d %H:00";

/// Counters for one calendar bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Point-in-time copy of the aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    /// Sum of successful generation durations in seconds.
    pub total_generation_time_secs: f64,
    pub average_generation_time_secs: f64,
    /// Completed jobs per `"WxH"` label.
    pub resolutions: BTreeMap<String, u64>,
    pub daily: BTreeMap<String, PeriodCounts>,
    pub hourly: BTreeMap<String, PeriodCounts>,
}

#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: StatsSnapshot,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one transition into the counters.
    ///
    /// `record` is the job's state *after* the transition was applied.
    pub fn record(&mut self, transition: &Transition, record: &JobRecord) {
        let bump: fn(&mut PeriodCounts) = match (transition.from, transition.to) {
            (None, JobStatus::Queued) => {
                self.stats.total_jobs += 1;
                |c| c.total += 1
            }
            (Some(_), JobStatus::Completed) => {
                self.stats.completed_jobs += 1;
                if let Some(secs) = record.generation_time_secs {
                    self.stats.total_generation_time_secs += secs;
                }
                self.stats.average_generation_time_secs =
                    self.stats.total_generation_time_secs / self.stats.completed_jobs as f64;
                *self
                    .stats
                    .resolutions
                    .entry(record.params.resolution_label())
                    .or_default() += 1;
                |c| c.completed += 1
            }
            (Some(_), JobStatus::Failed) => {
                self.stats.failed_jobs += 1;
                |c| c.failed += 1
            }
            // Dispatch is not a counted event.
            _ => return,
        };

        self.bump_periods(transition.at, bump);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.clone()
    }

    fn bump_periods(&mut self, at: Timestamp, bump: fn(&mut PeriodCounts)) {
        bump(
            self.stats
                .daily
                .entry(at.format(DAY_KEY_FORMAT).to_string())
                .or_default(),
        );
        bump(
            self.stats
                .hourly
                .entry(at.format(HOUR_KEY_FORMAT).to_string())
                .or_default(),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
