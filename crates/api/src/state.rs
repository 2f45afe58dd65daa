use std::sync::Arc;

use vidgen_worker::JobQueue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (the queue handle and config are shared).
#[derive(Clone)]
pub struct AppState {
    /// Handle to the generation job queue.
    pub queue: JobQueue,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
