//! Route definitions for the `/generations` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// POST   /                -> submit a generation request (202)
/// GET    /                -> list all jobs, oldest first
/// GET    /{id}            -> job status snapshot
/// GET    /{id}/video      -> download the generated video
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(generation::list).post(generation::submit))
        .route("/{id}", get(generation::get_status))
        .route("/{id}/video", get(generation::download))
}
