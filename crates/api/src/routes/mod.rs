pub mod generation;
pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{maintenance, queue};
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generations                 submit (POST), list (GET)
/// /generations/{id}            status
/// /generations/{id}/video      download
///
/// /queue                       running / queued counts
/// /stats                       aggregate statistics
/// /resolutions                 supported output resolutions
///
/// /maintenance/cleanup         delete old outputs (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generation::router())
        .route("/queue", get(queue::summary))
        .route("/stats", get(queue::stats))
        .route("/resolutions", get(queue::resolutions))
        .route("/maintenance/cleanup", post(maintenance::cleanup))
}
