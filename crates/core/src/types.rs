/// Local identifier of a tracked job (UUID v7, time-ordered).
pub type JobId = uuid::Uuid;

/// Caller-side history entry identifier.
pub type HistoryId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
