//! Execution side of the video generation queue.
//!
//! - [`JobQueue`]: the public handle: submit, status, summary, stats, cleanup.
//! - [`Generator`]: the seam to whatever renders the video.
//! - [`CommandGenerator`]: a generator that drives an external process.
//!
//! All job state is owned by one background task. Handles only exchange
//! messages with it.

pub mod command;
pub mod config;
pub mod error;
pub mod generator;
mod owner;
pub mod queue;
mod sweep;

pub use command::CommandGenerator;
pub use config::{CommandGeneratorConfig, QueueConfig};
pub use error::{DispatchError, GenerationError, QueueError};
pub use generator::{GenerationOutput, GenerationRequest, Generator, ProgressReporter};
pub use queue::{JobQueue, QueueSummary, SubmitReceipt};
