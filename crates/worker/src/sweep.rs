//! Filesystem half of output cleanup.
//!
//! Walks the results directory and applies
//! [`classify`](vidgen_core::cleanup::classify) to every generated file. The
//! caller supplies `in_use` so the scan never needs direct access to the
//! job table.

use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use vidgen_core::cleanup::{classify, max_age_from_hours, CleanupReport, FileDisposition};

/// Delete generated files older than `max_age_hours` that are not in use.
///
/// Only regular files whose extension equals `extension` are considered. A
/// missing directory yields an empty report. Files that fail to delete are
/// logged and counted in neither total.
pub(crate) async fn sweep_outputs<F>(
    dir: &Path,
    extension: &str,
    max_age_hours: u64,
    now: SystemTime,
    in_use: F,
) -> std::io::Result<CleanupReport>
where
    F: Fn(&Path) -> bool,
{
    let mut report = CleanupReport::new(max_age_hours);
    let max_age = max_age_from_hours(max_age_hours);

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "Cleanup: results directory missing");
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cleanup: cannot stat file");
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cleanup: no modification time");
                continue;
            }
        };
        // Files stamped in the future count as brand new.
        let age = now.duration_since(modified).unwrap_or_default();

        match classify(age, max_age, in_use(&path)) {
            FileDisposition::Delete => match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Cleanup: deleted old output");
                    report.record_deleted(metadata.len());
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cleanup: delete failed");
                }
            },
            FileDisposition::Protect => {
                tracing::debug!(path = %path.display(), "Cleanup: skipping output of running job");
                report.tally(FileDisposition::Protect);
            }
            FileDisposition::Preserve => report.tally(FileDisposition::Preserve),
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
