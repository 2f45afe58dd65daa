//! Run a single generation from the command line.
//!
//! Reads generation parameters as JSON from stdin, runs them through a
//! one-job queue backed by [`CommandGenerator`] and prints the final job
//! record as JSON.

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidgen_core::job::JobStatus;
use vidgen_worker::{CommandGenerator, CommandGeneratorConfig, JobQueue, QueueConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidgen_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        tracing::error!(error = %e, "Failed to read parameters from stdin");
        return ExitCode::FAILURE;
    }
    let body: serde_json::Value = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Parameters are not valid JSON");
            return ExitCode::FAILURE;
        }
    };

    let generator = Arc::new(CommandGenerator::new(CommandGeneratorConfig::from_env()));
    let queue = JobQueue::start(QueueConfig::from_env(), generator);

    let receipt = match queue.submit_json(body).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Submission rejected");
            return ExitCode::FAILURE;
        }
    };

    loop {
        let record = match queue.get_status(receipt.id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Lost track of job");
                return ExitCode::FAILURE;
            }
        };

        if record.status.is_terminal() {
            match serde_json::to_string_pretty(&record) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "Failed to encode job record"),
            }
            queue.shutdown();
            return if record.status == JobStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
