use crate::job::JobState;
use crate::types::HistoryId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("History entry not found: {0}")]
    HistoryNotFound(HistoryId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Credential error: {0}")]
    Credential(String),
}
