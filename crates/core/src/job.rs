//! Job record and lifecycle state machine.
//!
//! A job moves `Queued -> Running -> {Completed, Failed}` and never back.
//! The record is only ever mutated by the [`JobTable`](crate::table::JobTable)
//! owner; everyone else sees cloned snapshots.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::params::GenerationParams;
use crate::progress::Stage;
use crate::types::{JobId, Timestamp};

/// Maximum number of log entries retained per job.
pub const MAX_LOG_ENTRIES: usize = 200;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase name used in logs and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition rules for [`JobStatus`].
pub mod state_machine {
    use super::JobStatus;

    /// Statuses reachable in one step from `from`.
    ///
    /// Terminal states return an empty slice.
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Queued => &[JobStatus::Running],
            JobStatus::Running => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    /// Check whether moving from `from` to `to` is allowed.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }
}

/// A genuine status change, produced only when the recorded status differs
/// from the new one. Side effects (stats, logging) key off this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub job_id: JobId,
    /// `None` for the initial insertion of a job.
    pub from: Option<JobStatus>,
    pub to: JobStatus,
    pub at: Timestamp,
}

// ---------------------------------------------------------------------------
// Log entries
// ---------------------------------------------------------------------------

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Progress,
    Success,
    Error,
}

/// One line of a job's human-readable history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobLogEntry {
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Full state of one generation job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub params: GenerationParams,
    /// 0-based rank among queued jobs; `None` unless `status == Queued`.
    pub queue_position: Option<usize>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub progress_percent: f64,
    pub current_stage: Option<Stage>,
    pub stage_progress: f64,
    pub estimated_remaining_seconds: Option<u64>,
    /// Latest lifecycle or progress message.
    pub message: Option<String>,
    /// Where the generator was asked to write its output (set on dispatch).
    pub output_path: Option<PathBuf>,
    pub result_path: Option<String>,
    pub error: Option<String>,
    /// Wall-clock generation time, set on terminal transition.
    pub generation_time_secs: Option<f64>,
    pub logs: Vec<JobLogEntry>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn new(id: JobId, params: GenerationParams, queue_position: usize, now: Timestamp) -> Self {
        let mut record = Self {
            id,
            status: JobStatus::Queued,
            params,
            queue_position: Some(queue_position),
            created_at: now,
            started_at: None,
            completed_at: None,
            progress_percent: 0.0,
            current_stage: None,
            stage_progress: 0.0,
            estimated_remaining_seconds: None,
            message: Some("Queued for generation".to_string()),
            output_path: None,
            result_path: None,
            error: None,
            generation_time_secs: None,
            logs: Vec::new(),
        };
        record.push_log(now, LogLevel::Info, "Job added to queue");
        record
    }

    /// Seconds elapsed since the job started, if it has.
    pub fn elapsed_secs(&self, now: Timestamp) -> Option<f64> {
        self.started_at
            .map(|started| (now - started).num_milliseconds().max(0) as f64 / 1000.0)
    }

    /// Append to the job log, dropping the oldest entries past the cap.
    pub fn push_log(&mut self, at: Timestamp, level: LogLevel, message: impl Into<String>) {
        self.logs.push(JobLogEntry {
            timestamp: at,
            level,
            message: message.into(),
        });
        if self.logs.len() > MAX_LOG_ENTRIES {
            let excess = self.logs.len() - MAX_LOG_ENTRIES;
            self.logs.drain(..excess);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::state_machine::*;
    use super::*;
    use crate::types::new_job_id;

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    #[test]
    fn queued_to_running() {
        assert!(can_transition(JobStatus::Queued, JobStatus::Running));
    }

    #[test]
    fn running_to_terminal() {
        assert!(can_transition(JobStatus::Running, JobStatus::Completed));
        assert!(can_transition(JobStatus::Running, JobStatus::Failed));
    }

    #[test]
    fn queued_cannot_skip_running() {
        assert!(!can_transition(JobStatus::Queued, JobStatus::Completed));
        assert!(!can_transition(JobStatus::Queued, JobStatus::Failed));
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(valid_transitions(JobStatus::Completed).is_empty());
        assert!(valid_transitions(JobStatus::Failed).is_empty());
    }

    #[test]
    fn no_transition_reverses() {
        assert!(!can_transition(JobStatus::Running, JobStatus::Queued));
        assert!(!can_transition(JobStatus::Failed, JobStatus::Running));
        assert!(!can_transition(JobStatus::Completed, JobStatus::Failed));
    }

    #[test]
    fn self_transitions_are_not_valid() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert!(!can_transition(status, status), "{status} -> {status}");
        }
    }

    // -----------------------------------------------------------------------
    // Record
    // -----------------------------------------------------------------------

    #[test]
    fn new_record_is_queued_with_position() {
        let now = Utc::now();
        let record = JobRecord::new(new_job_id(), GenerationParams::new("p"), 3, now);
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.queue_position, Some(3));
        assert_eq!(record.created_at, now);
        assert!(record.started_at.is_none());
        assert_eq!(record.logs.len(), 1);
    }

    #[test]
    fn log_is_capped() {
        let now = Utc::now();
        let mut record = JobRecord::new(new_job_id(), GenerationParams::new("p"), 0, now);
        for i in 0..(MAX_LOG_ENTRIES + 25) {
            record.push_log(now, LogLevel::Progress, format!("line {i}"));
        }
        assert_eq!(record.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(
            record.logs.last().map(|e| e.message.as_str()),
            Some(format!("line {}", MAX_LOG_ENTRIES + 24).as_str())
        );
    }

    #[test]
    fn elapsed_requires_start() {
        let now = Utc::now();
        let mut record = JobRecord::new(new_job_id(), GenerationParams::new("p"), 0, now);
        assert!(record.elapsed_secs(now).is_none());
        record.started_at = Some(now - Duration::seconds(90));
        assert_eq!(record.elapsed_secs(now), Some(90.0));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(JobStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
    }
}
