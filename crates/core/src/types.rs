/// Job identifiers are random v4 UUIDs, opaque to callers.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh, unique job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4()
}
