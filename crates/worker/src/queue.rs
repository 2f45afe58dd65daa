//! Public handle to the job queue.
//!
//! [`JobQueue`] is cheap to clone and safe to use from any task or thread.
//! Every call is turned into a message for the owner task and awaits its
//! reply; nothing here touches job state directly.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use vidgen_core::cleanup::CleanupReport;
use vidgen_core::job::{JobRecord, JobStatus};
use vidgen_core::params::{validate_params, GenerationParams};
use vidgen_core::stats::StatsSnapshot;
use vidgen_core::types::JobId;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::generator::Generator;
use crate::owner::{Command, Owner};

/// Returned to the submitter once the job is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub id: JobId,
    /// Status after the dispatch pass that followed submission.
    pub status: JobStatus,
    /// Number of jobs that were queued ahead of this one at submission.
    pub queue_position: usize,
}

/// Point-in-time view of queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub running_count: usize,
    pub queued_count: usize,
    pub max_concurrency: usize,
    pub total_jobs: usize,
    /// Rough wait for a job submitted now; needs at least one completion.
    pub estimated_wait_secs: Option<u64>,
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Command>,
    ready: watch::Receiver<bool>,
    cancel: CancellationToken,
    /// Stops the owner once the last handle is dropped.
    _guard: Arc<DropGuard>,
    max_concurrency: usize,
}

impl JobQueue {
    /// Spawn the owner on the current Tokio runtime.
    pub fn start(config: QueueConfig, generator: Arc<dyn Generator>) -> Self {
        let (queue, owner, rx) = Self::build(config, generator);
        tokio::spawn(owner.run(rx, queue.cancel.clone()));
        queue
    }

    /// Run the owner on its own OS thread with a private runtime.
    ///
    /// Useful when the generator does blocking work that must not share
    /// worker threads with request handling.
    pub fn start_dedicated(
        config: QueueConfig,
        generator: Arc<dyn Generator>,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (queue, owner, rx) = Self::build(config, generator);
        let cancel = queue.cancel.clone();

        std::thread::Builder::new()
            .name("vidgen-queue".into())
            .spawn(move || runtime.block_on(owner.run(rx, cancel)))?;

        Ok(queue)
    }

    fn build(
        mut config: QueueConfig,
        generator: Arc<dyn Generator>,
    ) -> (Self, Owner, mpsc::UnboundedReceiver<Command>) {
        // A zero limit would never dispatch anything.
        config.max_concurrency = config.max_concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let max_concurrency = config.max_concurrency;

        let owner = Owner::new(config, generator, tx.clone(), ready_tx);
        let queue = Self {
            tx,
            ready: ready_rx,
            _guard: Arc::new(cancel.clone().drop_guard()),
            cancel,
            max_concurrency,
        };
        (queue, owner, rx)
    }

    // ---- operations ----

    /// Validate and enqueue a job.
    ///
    /// Invalid parameters are rejected here; no record is created for them.
    pub async fn submit(&self, params: GenerationParams) -> Result<SubmitReceipt, QueueError> {
        validate_params(&params)?;
        Ok(self
            .request(|reply| Command::Submit { params, reply })
            .await??)
    }

    /// Parse, validate and enqueue a raw JSON request body.
    pub async fn submit_json(&self, body: serde_json::Value) -> Result<SubmitReceipt, QueueError> {
        let params = GenerationParams::from_value(body)?;
        self.submit(params).await
    }

    pub async fn get_status(&self, id: JobId) -> Result<JobRecord, QueueError> {
        Ok(self.request(|reply| Command::GetStatus { id, reply }).await??)
    }

    /// All jobs, oldest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>, QueueError> {
        self.request(|reply| Command::ListJobs { reply }).await
    }

    pub async fn get_queue_summary(&self) -> Result<QueueSummary, QueueError> {
        self.request(|reply| Command::Summary { reply }).await
    }

    pub async fn get_stats(&self) -> Result<StatsSnapshot, QueueError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Delete generated files older than `max_age_hours`, except outputs of
    /// running jobs.
    pub async fn cleanup(&self, max_age_hours: u64) -> Result<CleanupReport, QueueError> {
        Ok(self
            .request(|reply| Command::Cleanup {
                max_age_hours,
                reply,
            })
            .await??)
    }

    // ---- lifecycle ----

    /// Whether the owner has finished initializing.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the owner has finished initializing.
    pub async fn wait_ready(&self) -> Result<(), QueueError> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|r| *r)
            .await
            .map(|_| ())
            .map_err(|_| QueueError::Unavailable)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Stop the owner. Running generator tasks are not interrupted, but
    /// their results are no longer recorded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| QueueError::Unavailable)?;
        rx.await.map_err(|_| QueueError::Unavailable)
    }
}
