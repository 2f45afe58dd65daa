use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgen_api::background;
use vidgen_api::config::ServerConfig;
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_worker::{CommandGenerator, CommandGeneratorConfig, JobQueue, QueueConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vidgen_api=debug,vidgen_worker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let queue_config = QueueConfig::from_env();
    let generator_config = CommandGeneratorConfig::from_env();
    tracing::info!(
        max_concurrency = queue_config.max_concurrency,
        results_dir = %queue_config.results_dir.display(),
        program = %generator_config.program,
        "Loaded queue configuration"
    );

    // --- Job queue ---
    // The owner gets its own thread so generator setup never competes with
    // request handling. Requests arriving before it is ready are buffered.
    let generator = Arc::new(CommandGenerator::new(generator_config));
    let queue =
        JobQueue::start_dedicated(queue_config, generator).expect("Failed to start job queue");
    tracing::info!("Job queue started");

    // --- Background cleanup ---
    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = (config.cleanup_interval_secs > 0).then(|| {
        tokio::spawn(background::cleanup::run(
            queue.clone(),
            Duration::from_secs(config.cleanup_interval_secs),
            config.cleanup_max_age_hours,
            cleanup_cancel.clone(),
        ))
    });

    // --- App state ---
    let state = AppState {
        queue: queue.clone(),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cleanup_cancel.cancel();
    if let Some(handle) = cleanup_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Output cleanup job stopped");
    }

    let summary = queue.get_queue_summary().await.ok();
    queue.shutdown();
    tracing::info!(
        running = summary.map(|s| s.running_count),
        queued = summary.map(|s| s.queued_count),
        "Job queue stopped"
    );

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
