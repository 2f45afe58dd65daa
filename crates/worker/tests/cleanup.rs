//! Integration tests for output cleanup through the queue handle.

mod common;

use std::time::Duration;

use common::{config, params, wait_for_status, write_aged, ScriptedGenerator};
use vidgen_core::job::JobStatus;
use vidgen_worker::JobQueue;

const HOUR: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Test: a stale running output is protected, a stale completed one is not
// ---------------------------------------------------------------------------

#[tokio::test]
async fn running_output_survives_completed_output_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new();
    let queue = JobQueue::start(config(dir.path(), 1), generator.clone());

    let finished = queue.submit(params("done earlier")).await.unwrap();
    generator.release(1);
    let finished = wait_for_status(&queue, finished.id, JobStatus::Completed).await;
    let finished_path = finished.output_path.unwrap();
    write_aged(&finished_path, 30 * HOUR);

    let running = queue.submit(params("still going")).await.unwrap();
    let running = wait_for_status(&queue, running.id, JobStatus::Running).await;
    let running_path = running.output_path.unwrap();
    write_aged(&running_path, 30 * HOUR);

    let report = queue.cleanup(24).await.unwrap();
    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.preserved_count, 0);
    assert_eq!(report.protected_count, 1);
    assert_eq!(report.max_age_hours, 24);

    assert!(running_path.exists());
    assert!(!finished_path.exists());
    generator.release(1);
}

// ---------------------------------------------------------------------------
// Test: young files are preserved and foreign files are left alone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn young_and_foreign_files_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let queue = JobQueue::start(config(dir.path(), 1), ScriptedGenerator::new());
    queue.wait_ready().await.unwrap();

    let young = dir.path().join("young.mp4");
    let notes = dir.path().join("notes.txt");
    let stale = dir.path().join("stale.mp4");
    write_aged(&young, HOUR);
    write_aged(&notes, 100 * HOUR);
    write_aged(&stale, 25 * HOUR);

    let report = queue.cleanup(24).await.unwrap();
    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.preserved_count, 1);
    assert_eq!(report.protected_count, 0);
    assert_eq!(report.bytes_reclaimed, 8);

    assert!(young.exists());
    assert!(notes.exists());
    assert!(!stale.exists());
}

// ---------------------------------------------------------------------------
// Test: the results directory is created on startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("nested").join("results");
    let queue = JobQueue::start(config(&results, 1), ScriptedGenerator::new());
    queue.wait_ready().await.unwrap();

    assert!(results.is_dir());
    let report = queue.cleanup(24).await.unwrap();
    assert_eq!(report.deleted_count + report.preserved_count, 0);
}
