use std::path::PathBuf;

use vidgen_core::error::CoreError;
use vidgen_core::types::JobId;

/// Failure raised by a [`Generator`](crate::generator::Generator).
///
/// Always stored on the job as its terminal `error` string; never returned
/// to the submitter.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    Failed(String),

    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    #[error("Generator exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("Generator finished without writing {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Generator panicked: {0}")]
    Panicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A defect inside the queue owner itself.
///
/// Logged and swallowed by the owner loop so one bad job cannot stop
/// scheduling for the rest.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to start next job: {0}")]
    Start(CoreError),

    #[error("Failed to commit result for job {job_id}: {source}")]
    Commit { job_id: JobId, source: CoreError },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors returned by the public [`JobQueue`](crate::queue::JobQueue) surface.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Validation and not-found failures from the domain layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The queue owner has stopped and can no longer take requests.
    #[error("Job queue is not running")]
    Unavailable,
}
