#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use vidgen_api::config::ServerConfig;
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_core::job::{JobRecord, JobStatus};
use vidgen_core::types::JobId;
use vidgen_worker::{
    GenerationError, GenerationOutput, GenerationRequest, Generator, JobQueue, ProgressReporter,
    QueueConfig,
};

/// Bytes written by [`StubGenerator`] for successful jobs.
pub const STUB_VIDEO: &[u8] = b"not really an mp4";

/// Generator that finishes instantly unless told otherwise by the prompt.
///
/// - `hold...` never finishes.
/// - `fail...` fails with `stub failure`.
/// - anything else writes [`STUB_VIDEO`] to the output path.
pub struct StubGenerator;

#[async_trait]
impl Generator for StubGenerator {
    async fn execute(
        &self,
        request: GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<GenerationOutput, GenerationError> {
        progress.report_text(50.0, "Rendering frame 1/2");
        let prompt = request.params.prompt.as_str();
        if prompt.starts_with("hold") {
            std::future::pending::<()>().await;
        }
        if prompt.starts_with("fail") {
            return Err(GenerationError::Failed("stub failure".into()));
        }
        tokio::fs::write(&request.output_path, STUB_VIDEO).await?;
        Ok(GenerationOutput {
            path: request.output_path,
        })
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        cleanup_interval_secs: 0,
        cleanup_max_age_hours: 24,
    }
}

/// Build the full application router backed by a fresh queue writing into
/// `results_dir`.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack.
pub fn build_test_app(results_dir: &Path, max_concurrency: usize) -> (Router, JobQueue) {
    let config = test_config();
    let queue = JobQueue::start(
        QueueConfig::new(results_dir).with_max_concurrency(max_concurrency),
        Arc::new(StubGenerator),
    );
    let state = AppState {
        queue: queue.clone(),
        config: Arc::new(config.clone()),
    };
    (build_app_router(state, &config), queue)
}

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_empty(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll the queue until `id` reaches `status`.
pub async fn wait_for_status(queue: &JobQueue, id: JobId, status: JobStatus) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = queue.get_status(id).await.unwrap();
        if record.status == status {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} stuck in {}",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
