//! In-memory job table: every record ever submitted plus the FIFO of queued ids.
//!
//! The table is a plain owned struct with no interior locking. Exactly one
//! execution context owns it and performs every mutation; readers receive
//! cloned snapshots. All status changes go through [`JobTable::transition`],
//! which compares against the previously recorded status so that repeated
//! calls with an unchanged status report no transition.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::job::{state_machine, JobRecord, JobStatus, LogLevel, Transition};
use crate::params::GenerationParams;
use crate::progress::{apply_progress, ProgressUpdate};
use crate::types::{JobId, Timestamp};

/// Everything the dispatcher needs to launch a job.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedJob {
    pub job_id: JobId,
    pub params: GenerationParams,
    pub output_path: PathBuf,
    pub transition: Transition,
}

/// Terminal result reported by the generator.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { result_path: String },
    Failed { error: String },
}

/// Counts by status, derived by scanning the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct JobTable {
    records: HashMap<JobId, JobRecord>,
    queue: VecDeque<JobId>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- reads ----

    pub fn get(&self, id: JobId) -> Result<&JobRecord, CoreError> {
        self.records
            .get(&id)
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// Cloned snapshot of one record.
    pub fn snapshot(&self, id: JobId) -> Result<JobRecord, CoreError> {
        self.get(id).cloned()
    }

    /// Snapshots of all records, oldest first.
    pub fn snapshots(&self) -> Vec<JobRecord> {
        let mut all: Vec<JobRecord> = self.records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of jobs currently queued.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Number of Running records, counted by status rather than tracked.
    pub fn running_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == JobStatus::Running)
            .count()
    }

    pub fn counts(&self) -> StatusCounts {
        self.records
            .values()
            .fold(StatusCounts::default(), |mut acc, r| {
                match r.status {
                    JobStatus::Queued => acc.queued += 1,
                    JobStatus::Running => acc.running += 1,
                    JobStatus::Completed => acc.completed += 1,
                    JobStatus::Failed => acc.failed += 1,
                }
                acc
            })
    }

    /// Queued ids in dispatch order.
    pub fn queued_ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.queue.iter().copied()
    }

    /// Planned output paths of every running job.
    pub fn running_outputs(&self) -> HashSet<PathBuf> {
        self.records
            .values()
            .filter(|r| r.status == JobStatus::Running)
            .filter_map(|r| r.output_path.clone())
            .collect()
    }

    // ---- mutations ----

    /// Insert a new queued job at the tail of the queue.
    ///
    /// Returns the insertion transition; the job's position equals the
    /// number of jobs queued before it.
    pub fn insert(
        &mut self,
        id: JobId,
        params: GenerationParams,
        now: Timestamp,
    ) -> Result<(usize, Transition), CoreError> {
        if self.records.contains_key(&id) {
            return Err(CoreError::Internal(format!("duplicate job id {id}")));
        }
        let position = self.queue.len();
        self.records
            .insert(id, JobRecord::new(id, params, position, now));
        self.queue.push_back(id);

        Ok((
            position,
            Transition {
                job_id: id,
                from: None,
                to: JobStatus::Queued,
                at: now,
            },
        ))
    }

    /// Move `id` to `to` if that is a genuine, allowed change.
    ///
    /// Returns `Ok(None)` when the recorded status already equals `to`, so
    /// callers can apply side effects only for `Some`.
    pub fn transition(
        &mut self,
        id: JobId,
        to: JobStatus,
        now: Timestamp,
    ) -> Result<Option<Transition>, CoreError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| CoreError::job_not_found(id))?;

        let from = record.status;
        if from == to {
            return Ok(None);
        }
        if !state_machine::can_transition(from, to) {
            return Err(CoreError::InvalidTransition { from, to });
        }

        record.status = to;
        match to {
            JobStatus::Running => {
                record.started_at.get_or_insert(now);
                record.queue_position = None;
            }
            JobStatus::Completed | JobStatus::Failed => {
                record.completed_at.get_or_insert(now);
                record.generation_time_secs = record.elapsed_secs(now);
                record.estimated_remaining_seconds = None;
            }
            JobStatus::Queued => {}
        }

        Ok(Some(Transition {
            job_id: id,
            from: Some(from),
            to,
            at: now,
        }))
    }

    /// Pop the head of the queue and mark it Running.
    ///
    /// Remaining queued jobs are renumbered immediately.
    pub fn start_next(
        &mut self,
        results_dir: &Path,
        extension: &str,
        now: Timestamp,
    ) -> Result<Option<StartedJob>, CoreError> {
        let Some(id) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.recompute_positions();

        let transition = self
            .transition(id, JobStatus::Running, now)?
            .ok_or_else(|| CoreError::Internal(format!("job {id} was queued while running")))?;

        let output_path = results_dir.join(format!("{id}.{extension}"));
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| CoreError::job_not_found(id))?;
        record.output_path = Some(output_path.clone());
        record.message = Some("Processing video generation request".to_string());
        record.push_log(now, LogLevel::Info, "Generation started");

        Ok(Some(StartedJob {
            job_id: id,
            params: record.params.clone(),
            output_path,
            transition,
        }))
    }

    /// Overwrite progress fields of a running job.
    ///
    /// Returns `false` (and changes nothing) when the job is not running.
    pub fn apply_progress(
        &mut self,
        id: JobId,
        update: &ProgressUpdate,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| CoreError::job_not_found(id))?;
        if record.status != JobStatus::Running {
            return Ok(false);
        }
        apply_progress(record, update, now);
        Ok(true)
    }

    /// Commit a generator result as the job's terminal state.
    pub fn finish(
        &mut self,
        id: JobId,
        outcome: JobOutcome,
        now: Timestamp,
    ) -> Result<Option<Transition>, CoreError> {
        let to = match outcome {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        };
        let Some(transition) = self.transition(id, to, now)? else {
            return Ok(None);
        };

        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| CoreError::job_not_found(id))?;
        match outcome {
            JobOutcome::Completed { result_path } => {
                record.result_path = Some(result_path);
                record.error = None;
                record.progress_percent = 100.0;
                record.stage_progress = 100.0;
                record.message = Some("Video generation completed successfully".to_string());
                record.push_log(now, LogLevel::Success, "Generation completed");
            }
            JobOutcome::Failed { error } => {
                record.result_path = None;
                record.message = Some(format!("Error: {error}"));
                record.push_log(now, LogLevel::Error, format!("Generation failed: {error}"));
                record.error = Some(error);
            }
        }
        Ok(Some(transition))
    }

    fn recompute_positions(&mut self) {
        for (position, id) in self.queue.iter().enumerate() {
            if let Some(record) = self.records.get_mut(id) {
                record.queue_position = Some(position);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
