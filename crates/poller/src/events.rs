//! Events emitted by the poller as jobs move through their lifecycle.
//!
//! Subscribe with [`JobPoller::subscribe`](crate::JobPoller::subscribe).
//! Events are advisory; the authoritative state is always the job itself.

use serde::Serialize;
use vidforge_core::job::JobErrorKind;
use vidforge_core::types::{HistoryId, JobId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The service accepted the job and assigned it an id.
    Submitted { job_id: JobId, provider_id: String },

    /// A status call reported the job still running.
    Polling { job_id: JobId, attempt: u32 },

    /// The artifact was downloaded.
    Succeeded {
        job_id: JobId,
        size_bytes: usize,
        /// History entry the job was recorded under.
        history_id: Option<HistoryId>,
    },

    /// The job ended in failure.
    Failed {
        job_id: JobId,
        kind: JobErrorKind,
        message: String,
    },

    /// The caller cancelled the job.
    Cancelled { job_id: JobId },

    /// Credential selection must run again before the next submission.
    CredentialRequired { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Submitted { job_id, .. }
            | Self::Polling { job_id, .. }
            | Self::Succeeded { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id }
            | Self::CredentialRequired { job_id } => *job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_event_serializes_with_tag() {
        let job_id = uuid::Uuid::nil();
        let event = JobEvent::Failed {
            job_id,
            kind: JobErrorKind::Credential,
            message: "Requested entity was not found.".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["kind"], "credential");
        assert_eq!(event.job_id(), job_id);
    }
}
