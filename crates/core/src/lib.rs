//! Domain logic for the video generation queue.
//!
//! Everything in this crate is synchronous and free of I/O:
//!
//! - [`job`]: job records and the lifecycle state machine.
//! - [`table`]: the in-memory job table and FIFO queue.
//! - [`progress`]: stage detection and ETA estimation.
//! - [`stats`]: counters derived from job transitions.
//! - [`cleanup`]: the output retention policy.
//! - [`params`]: request parameters, validation and supported resolutions.

pub mod cleanup;
pub mod error;
pub mod job;
pub mod params;
pub mod progress;
pub mod stats;
pub mod table;
pub mod types;

pub use error::CoreError;
pub use job::{JobRecord, JobStatus, Transition};
pub use params::GenerationParams;
pub use progress::{ProgressUpdate, Stage};
pub use table::{JobOutcome, JobTable};
pub use types::JobId;
