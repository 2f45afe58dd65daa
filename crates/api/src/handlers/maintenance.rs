//! Maintenance endpoints.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use vidgen_core::cleanup::CleanupReport;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for the cleanup endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    /// Files older than this are deleted; defaults to the configured retention.
    pub max_age_hours: Option<u64>,
}

/// POST /api/v1/maintenance/cleanup
///
/// Delete generated files older than the threshold, except outputs of
/// running jobs. The body is optional.
pub async fn cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> AppResult<Json<DataResponse<CleanupReport>>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let max_age_hours = request
        .max_age_hours
        .unwrap_or(state.config.cleanup_max_age_hours);

    let report = state.queue.cleanup(max_age_hours).await?;
    Ok(Json(DataResponse { data: report }))
}
