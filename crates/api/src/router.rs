//! HTTP application assembly.
//!
//! [`build_app_router`] is shared by `main.rs` and the integration tests.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Header carrying the per-request id, echoed back to the client.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the router: `/health` at the root, the queue API under `/api/v1`.
///
/// Layers, outermost first: CORS, request id, tracing, timeout, panic
/// recovery. The timeout only bounds individual requests; downloads of large
/// videos stream within it.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS for browser clients polling job status.
///
/// The API is read/submit only and unauthenticated, so only `GET`/`POST` with
/// a JSON body are allowed and credentials are not.
///
/// Panics at startup if any configured origin is invalid.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec!["http://localhost:3000".into()],
            request_timeout_secs: 30,
            cleanup_interval_secs: 0,
            cleanup_max_age_hours: 24,
        }
    }

    async fn preflight(headers: &str) -> axum::http::Response<axum::body::Body> {
        let app = Router::new()
            .route("/", axum::routing::post(|| async {}))
            .layer(build_cors_layer(&config()));
        app.oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/")
                .header("Origin", "http://localhost:3000")
                .header("Access-Control-Request-Method", "POST")
                .header("Access-Control-Request-Headers", headers)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // CORS policy
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cors_does_not_allow_credentials() {
        let response = preflight("content-type").await;
        assert!(response
            .headers()
            .get("access-control-allow-credentials")
            .is_none());
        let allowed = response.headers()["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert_eq!(allowed, "content-type");
    }
}
