//! Handlers for the `/generations` resource.
//!
//! Submission, status polling and download of generated videos.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::io::ReaderStream;
use vidgen_core::job::{JobRecord, JobStatus};
use vidgen_core::types::JobId;
use vidgen_worker::SubmitReceipt;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Parse a path segment into a job id.
fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid job id: {raw}")))
}

/// POST /api/v1/generations
///
/// Validate and enqueue a generation request. The body is the parameter
/// object itself; unknown keys are forwarded to the generator.
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<(StatusCode, Json<DataResponse<SubmitReceipt>>)> {
    let receipt = state.queue.submit_json(body).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: receipt })))
}

/// GET /api/v1/generations
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<JobRecord>>>> {
    let jobs = state.queue.list_jobs().await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/generations/{id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<JobRecord>>> {
    let record = state.queue.get_status(parse_job_id(&id)?).await?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/generations/{id}/video
///
/// Stream the generated file of a completed job.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let record = state.queue.get_status(parse_job_id(&id)?).await?;
    if record.status != JobStatus::Completed {
        return Err(AppError::BadRequest(format!(
            "Video generation is {}",
            record.status
        )));
    }

    let path = record
        .result_path
        .ok_or_else(|| AppError::InternalError(format!("Completed job {id} has no result")))?;
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(vidgen_core::CoreError::NotFound {
                entity: "video",
                id,
            }
            .into());
        }
        Err(e) => return Err(AppError::InternalError(format!("Cannot open {path}: {e}"))),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    Ok(([(header::CONTENT_TYPE, "video/mp4")], body).into_response())
}
