//! Periodic cleanup of old generated videos.
//!
//! Asks the job queue to sweep its results directory on a fixed interval.
//! Outputs of running jobs are never touched; the queue enforces that.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vidgen_worker::JobQueue;

/// Run the output cleanup loop until `cancel` is triggered.
///
/// The first sweep happens one full `interval` after startup.
pub async fn run(
    queue: JobQueue,
    interval: Duration,
    max_age_hours: u64,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_age_hours,
        interval_secs = interval.as_secs(),
        "Output cleanup job started"
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Output cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match queue.cleanup(max_age_hours).await {
                    Ok(report) => {
                        if report.deleted_count > 0 {
                            tracing::info!(
                                deleted = report.deleted_count,
                                bytes_reclaimed = report.bytes_reclaimed,
                                "Output cleanup: purged old videos"
                            );
                        } else {
                            tracing::debug!("Output cleanup: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Output cleanup: sweep failed");
                    }
                }
            }
        }
    }
}
