//! Output cleanup policy.
//!
//! Pure classification of generated files by age and in-flight protection.
//! The filesystem walk itself lives with the queue owner, which is the only
//! place that can see which jobs are currently running.

use std::time::Duration;

use serde::Serialize;

/// Default retention for generated files.
pub const DEFAULT_MAX_AGE_HOURS: u64 = 24;

/// What the sweep should do with one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    /// Older than the threshold and not in use.
    Delete,
    /// Not yet older than the threshold.
    Preserve,
    /// Old enough to delete, but a running job is writing it.
    Protect,
}

/// Decide the fate of a file.
///
/// Only files *strictly* older than `max_age` are eligible; protection is
/// checked only for those.
pub fn classify(age: Duration, max_age: Duration, in_use: bool) -> FileDisposition {
    if age <= max_age {
        FileDisposition::Preserve
    } else if in_use {
        FileDisposition::Protect
    } else {
        FileDisposition::Delete
    }
}

/// Convert the caller-facing hour threshold into a duration.
pub fn max_age_from_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

/// Report returned after a cleanup run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted_count: u64,
    pub preserved_count: u64,
    /// Stale files skipped because a running job owns them.
    pub protected_count: u64,
    pub bytes_reclaimed: u64,
    pub max_age_hours: u64,
}

impl CleanupReport {
    pub fn new(max_age_hours: u64) -> Self {
        Self {
            max_age_hours,
            ..Self::default()
        }
    }

    /// Count a file that was not deleted.
    pub fn tally(&mut self, disposition: FileDisposition) {
        match disposition {
            FileDisposition::Preserve => self.preserved_count += 1,
            FileDisposition::Protect => self.protected_count += 1,
            FileDisposition::Delete => {}
        }
    }

    /// Count a successful deletion of `bytes`.
    pub fn record_deleted(&mut self, bytes: u64) {
        self.deleted_count += 1;
        self.bytes_reclaimed += bytes;
    }
}
