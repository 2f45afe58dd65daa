//! Read-only queue views: occupancy, statistics and supported resolutions.

use axum::extract::State;
use axum::Json;
use vidgen_core::params::{SupportedResolution, SUPPORTED_RESOLUTIONS};
use vidgen_core::stats::StatsSnapshot;
use vidgen_worker::QueueSummary;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/queue
pub async fn summary(State(state): State<AppState>) -> AppResult<Json<DataResponse<QueueSummary>>> {
    let summary = state.queue.get_queue_summary().await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<DataResponse<StatsSnapshot>>> {
    let stats = state.queue.get_stats().await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/resolutions
pub async fn resolutions() -> Json<DataResponse<&'static [SupportedResolution]>> {
    Json(DataResponse {
        data: SUPPORTED_RESOLUTIONS,
    })
}
