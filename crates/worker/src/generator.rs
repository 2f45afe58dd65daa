//! The generator seam: whatever actually produces a video.
//!
//! The queue treats generation as an opaque, possibly long-running call. It
//! runs outside the owner context and reports progress back through a
//! [`ProgressReporter`], which only ever enqueues a message for the owner.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;
use vidgen_core::params::GenerationParams;
use vidgen_core::progress::{ProgressUpdate, Stage};
use vidgen_core::types::JobId;

use crate::error::GenerationError;
use crate::owner::Command;

/// Everything a generator needs to run one job.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub job_id: JobId,
    pub params: GenerationParams,
    /// Where the result should be written.
    pub output_path: PathBuf,
}

/// Successful generation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    pub path: PathBuf,
}

#[async_trait]
pub trait Generator: Send + Sync + 'static {
    /// One-time setup, run by the queue owner before it serves requests.
    ///
    /// A failure is logged; the queue still starts and jobs fail
    /// individually if the generator really is unusable.
    async fn initialize(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Produce the output for `request`, reporting progress as it goes.
    async fn execute(
        &self,
        request: GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<GenerationOutput, GenerationError>;
}

/// Fire-and-forget progress callback bound to one job.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    tx: mpsc::UnboundedSender<Command>,
}

impl ProgressReporter {
    pub(crate) fn new(job_id: JobId, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { job_id, tx }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Send a structured update.
    pub fn report(&self, update: ProgressUpdate) {
        let sent = self.tx.send(Command::Progress {
            id: self.job_id,
            update,
        });
        if sent.is_err() {
            tracing::debug!(job_id = %self.job_id, "Progress dropped, job queue stopped");
        }
    }

    /// Send a free-text update, e.g. a line from generator logs.
    ///
    /// The stage is inferred from the message, falling back to the stage
    /// that owns `percent`.
    pub fn report_text(&self, percent: f64, message: &str) {
        let message = message.trim();
        let update = if message.is_empty() {
            ProgressUpdate::new(Stage::for_percent(percent), percent)
        } else {
            ProgressUpdate::from_message(percent, message)
        };
        self.report(update);
    }
}
