//! The queue owner: the single task that owns the job table.
//!
//! Every mutation and every dispatch decision happens inside [`Owner::run`].
//! Callers reach it only through [`Command`] messages; generator tasks report
//! progress and results the same way. Generation itself runs in detached
//! tasks so a slow job never blocks the owner.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use vidgen_core::cleanup::CleanupReport;
use vidgen_core::error::CoreError;
use vidgen_core::job::{JobRecord, Transition};
use vidgen_core::params::GenerationParams;
use vidgen_core::progress::ProgressUpdate;
use vidgen_core::stats::{StatsAggregator, StatsSnapshot};
use vidgen_core::table::{JobOutcome, JobTable, StartedJob};
use vidgen_core::types::{new_job_id, JobId};

use crate::config::QueueConfig;
use crate::error::{DispatchError, GenerationError};
use crate::generator::{GenerationOutput, GenerationRequest, Generator, ProgressReporter};
use crate::queue::{QueueSummary, SubmitReceipt};
use crate::sweep::sweep_outputs;

/// Messages handled by the owner.
#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        params: GenerationParams,
        reply: oneshot::Sender<Result<SubmitReceipt, CoreError>>,
    },
    GetStatus {
        id: JobId,
        reply: oneshot::Sender<Result<JobRecord, CoreError>>,
    },
    ListJobs {
        reply: oneshot::Sender<Vec<JobRecord>>,
    },
    Summary {
        reply: oneshot::Sender<QueueSummary>,
    },
    Stats {
        reply: oneshot::Sender<StatsSnapshot>,
    },
    Cleanup {
        max_age_hours: u64,
        reply: oneshot::Sender<Result<CleanupReport, CoreError>>,
    },
    Progress {
        id: JobId,
        update: ProgressUpdate,
    },
    Finished {
        id: JobId,
        outcome: Result<GenerationOutput, GenerationError>,
    },
}

pub(crate) struct Owner {
    config: QueueConfig,
    generator: Arc<dyn Generator>,
    table: JobTable,
    stats: StatsAggregator,
    /// Handed to generator tasks so they can report back.
    tx: mpsc::UnboundedSender<Command>,
    ready: watch::Sender<bool>,
}

impl Owner {
    pub(crate) fn new(
        config: QueueConfig,
        generator: Arc<dyn Generator>,
        tx: mpsc::UnboundedSender<Command>,
        ready: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            generator,
            table: JobTable::new(),
            stats: StatsAggregator::new(),
            tx,
            ready,
        }
    }

    /// Initialize, then serve commands until `cancel` fires.
    ///
    /// Commands sent before initialization finishes wait in the channel and
    /// are processed in order afterwards.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            max_concurrency = self.config.max_concurrency,
            results_dir = %self.config.results_dir.display(),
            "Job queue owner starting",
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.config.results_dir).await {
            tracing::error!(
                results_dir = %self.config.results_dir.display(),
                error = %e,
                "Failed to create results directory",
            );
        }
        if let Err(e) = self.generator.initialize().await {
            tracing::error!(error = %e, "Generator initialization failed");
        }

        self.ready.send_replace(true);
        tracing::info!(buffered = rx.len(), "Job queue ready");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job queue owner shutting down");
                    break;
                }
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Err(e) = self.handle(cmd).await {
                        tracing::error!(error = %e, "Job queue command failed");
                    }
                }
            }
        }

        self.ready.send_replace(false);
    }

    async fn handle(&mut self, cmd: Command) -> Result<(), DispatchError> {
        match cmd {
            Command::Submit { params, reply } => {
                let receipt = self.submit(params);
                // Dispatch before replying so the receipt reflects it.
                let dispatched = self.dispatch();
                let receipt = receipt.map(|r| SubmitReceipt {
                    status: self
                        .table
                        .get(r.id)
                        .map(|rec| rec.status)
                        .unwrap_or(r.status),
                    ..r
                });
                respond(reply, receipt);
                dispatched
            }
            Command::GetStatus { id, reply } => {
                respond(reply, self.table.snapshot(id));
                Ok(())
            }
            Command::ListJobs { reply } => {
                respond(reply, self.table.snapshots());
                Ok(())
            }
            Command::Summary { reply } => {
                respond(reply, self.summary());
                Ok(())
            }
            Command::Stats { reply } => {
                respond(reply, self.stats.snapshot());
                Ok(())
            }
            Command::Cleanup {
                max_age_hours,
                reply,
            } => {
                self.cleanup(max_age_hours, reply);
                Ok(())
            }
            Command::Progress { id, update } => {
                if !self.table.apply_progress(id, &update, Utc::now())? {
                    tracing::debug!(job_id = %id, "Ignoring progress for job that is not running");
                }
                Ok(())
            }
            Command::Finished { id, outcome } => self.finish(id, outcome),
        }
    }

    // ---- submission ----

    fn submit(&mut self, params: GenerationParams) -> Result<SubmitReceipt, CoreError> {
        let id = new_job_id();
        let (queue_position, transition) = self.table.insert(id, params, Utc::now())?;
        self.record_transition(&transition);

        tracing::info!(job_id = %id, queue_position, "Job submitted");

        Ok(SubmitReceipt {
            id,
            status: transition.to,
            queue_position,
        })
    }

    // ---- dispatch ----

    /// Start queued jobs while running capacity remains.
    ///
    /// Capacity is recounted from job status on every iteration.
    fn dispatch(&mut self) -> Result<(), DispatchError> {
        while self.table.running_count() < self.config.max_concurrency {
            let started = self
                .table
                .start_next(
                    &self.config.results_dir,
                    &self.config.output_extension,
                    Utc::now(),
                )
                .map_err(DispatchError::Start)?;
            let Some(started) = started else { break };

            self.record_transition(&started.transition);
            self.launch(started);
        }
        Ok(())
    }

    /// Run the generator for one job in a detached task.
    fn launch(&self, job: StartedJob) {
        tracing::info!(
            job_id = %job.job_id,
            output_path = %job.output_path.display(),
            running = self.table.running_count(),
            queued = self.table.queued_count(),
            "Job dispatched",
        );

        let id = job.job_id;
        let generator = Arc::clone(&self.generator);
        let tx = self.tx.clone();
        let reporter = ProgressReporter::new(id, tx.clone());
        let request = GenerationRequest {
            job_id: id,
            params: job.params,
            output_path: job.output_path,
        };

        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(generator.execute(request, reporter))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => Err(GenerationError::Panicked(panic_message(panic.as_ref()))),
            };
            if tx.send(Command::Finished { id, outcome }).is_err() {
                tracing::warn!(job_id = %id, "Job queue stopped before result was committed");
            }
        });
    }

    /// Commit a generator result, then refill free capacity.
    fn finish(
        &mut self,
        id: JobId,
        result: Result<GenerationOutput, GenerationError>,
    ) -> Result<(), DispatchError> {
        let outcome = match result {
            Ok(output) => {
                tracing::info!(job_id = %id, path = %output.path.display(), "Generation completed");
                JobOutcome::Completed {
                    result_path: output.path.display().to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Generation failed");
                JobOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let committed = self.table.finish(id, outcome, Utc::now());
        if let Ok(Some(transition)) = &committed {
            self.record_transition(transition);
        }

        // Refill capacity even when the commit itself failed.
        let dispatched = self.dispatch();
        committed.map_err(|source| DispatchError::Commit { job_id: id, source })?;
        dispatched
    }

    fn record_transition(&mut self, transition: &Transition) {
        match self.table.get(transition.job_id) {
            Ok(record) => self.stats.record(transition, record),
            Err(e) => tracing::error!(error = %e, "Transition for untracked job"),
        }
        tracing::debug!(
            job_id = %transition.job_id,
            from = ?transition.from,
            to = %transition.to,
            "Job transition",
        );
    }

    // ---- reads ----

    fn summary(&self) -> QueueSummary {
        let counts = self.table.counts();
        let stats = self.stats.snapshot();
        let max_concurrency = self.config.max_concurrency;

        let estimated_wait_secs = (counts.queued > 0 && stats.completed_jobs > 0).then(|| {
            let wait = counts.queued as f64 * stats.average_generation_time_secs
                / max_concurrency as f64;
            wait.round() as u64
        });

        QueueSummary {
            running_count: counts.running,
            queued_count: counts.queued,
            max_concurrency,
            total_jobs: self.table.len(),
            estimated_wait_secs,
        }
    }

    /// Sweep the results directory in a separate task.
    ///
    /// Only the set of running outputs is taken here. Jobs dispatched after
    /// the snapshot write fresh files, which the sweep never deletes.
    fn cleanup(
        &self,
        max_age_hours: u64,
        reply: oneshot::Sender<Result<CleanupReport, CoreError>>,
    ) {
        let in_use = self.table.running_outputs();
        let dir = self.config.results_dir.clone();
        let extension = self.config.output_extension.clone();

        tokio::spawn(async move {
            let result = sweep_outputs(&dir, &extension, max_age_hours, SystemTime::now(), |path| {
                in_use.contains(path)
            })
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to scan {}: {e}", dir.display())));

            if let Ok(report) = &result {
                tracing::info!(
                    deleted = report.deleted_count,
                    preserved = report.preserved_count,
                    protected = report.protected_count,
                    bytes_reclaimed = report.bytes_reclaimed,
                    max_age_hours,
                    "Cleanup finished",
                );
            }
            respond(reply, result);
        });
    }
}

/// Send a reply, tolerating callers that stopped waiting.
fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        tracing::debug!("Caller went away before the reply was sent");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
