//! Job lifecycle state machine.
//!
//! ```text
//! Submitted --> Polling --> Succeeded
//!     |            |------> Failed
//!     |            '------> Cancelled
//!     |-------------------> Failed
//!     '-------------------> Cancelled
//! ```
//!
//! Terminal states never change again. All mutation goes through the
//! transition methods on [`Job`], which return
//! [`CoreError::InvalidTransition`] instead of overwriting a terminal job.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::request::GenerationRequest;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, to: JobState) -> bool {
        matches!(
            (self, to),
            (Self::Submitted, Self::Polling | Self::Failed | Self::Cancelled)
                | (Self::Polling, Self::Succeeded | Self::Failed | Self::Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors attached to failed jobs
// ---------------------------------------------------------------------------

/// Classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// Bad request shape, caught before submission.
    Validation,
    /// Missing or rejected access credential. Requires user action.
    Credential,
    /// The service refused the job because a quota was exhausted.
    Quota,
    /// The artifact was reported ready but could not be downloaded.
    Retrieval,
    /// The service finished without anything to retrieve.
    NoResult,
    /// The service reported the operation itself as failed.
    Generation,
    /// Any other failure while submitting or polling.
    Transient,
}

impl JobErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Credential => "credential",
            Self::Quota => "quota",
            Self::Retrieval => "retrieval",
            Self::NoResult => "no_result",
            Self::Generation => "generation",
            Self::Transient => "transient",
        }
    }

    /// Suggested next step to show alongside the error message.
    pub fn user_action(self) -> &'static str {
        match self {
            Self::Validation => "Fix the request and submit again.",
            Self::Credential => "Select a valid API key before generating again.",
            Self::Quota => "Wait for quota to reset or check the billing settings.",
            Self::Retrieval | Self::NoResult | Self::Generation | Self::Transient => {
                "Try again."
            }
        }
    }
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<CoreError> for JobError {
    fn from(err: CoreError) -> Self {
        let kind = match err {
            CoreError::Validation(_) => JobErrorKind::Validation,
            CoreError::Credential(_) => JobErrorKind::Credential,
            CoreError::HistoryNotFound(_) | CoreError::InvalidTransition { .. } => {
                JobErrorKind::Transient
            }
        };
        Self::new(kind, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Provider id and artifact
// ---------------------------------------------------------------------------

/// Identifier the remote service assigned to the job (its operation name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderJobId(String);

impl ProviderJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A downloaded generation result held in memory.
///
/// Bytes are reference-counted so job snapshots stay cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Arc<[u8]>,
    pub mime_type: Option<String>,
    /// Where the artifact was downloaded from.
    pub source_uri: String,
}

impl Artifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: Option<String>, source_uri: String) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type,
            source_uri,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One long-running generation request.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    provider_id: Option<ProviderJobId>,
    request: GenerationRequest,
    state: JobState,
    result: Option<Artifact>,
    error: Option<JobError>,
    created_at: Timestamp,
    finished_at: Option<Timestamp>,
    poll_count: u32,
}

impl Job {
    /// Create a job in `Submitted` with a fresh local id.
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            provider_id: None,
            request,
            state: JobState::Submitted,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
            poll_count: 0,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn provider_id(&self) -> Option<&ProviderJobId> {
        self.provider_id.as_ref()
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn result(&self) -> Option<&Artifact> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Number of status calls made for this job so far.
    pub fn poll_count(&self) -> u32 {
        self.poll_count
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `Submitted -> Polling`, recording the provider-assigned id.
    pub fn begin_polling(&mut self, provider_id: ProviderJobId) -> Result<(), CoreError> {
        self.transition(JobState::Polling)?;
        self.provider_id = Some(provider_id);
        Ok(())
    }

    /// Count one status call. Only valid while `Polling`.
    pub fn record_poll(&mut self) -> Result<u32, CoreError> {
        if self.state != JobState::Polling {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to: JobState::Polling,
            });
        }
        self.poll_count += 1;
        Ok(self.poll_count)
    }

    /// `Polling -> Succeeded` with the downloaded artifact.
    pub fn succeed(&mut self, artifact: Artifact) -> Result<(), CoreError> {
        self.transition(JobState::Succeeded)?;
        self.result = Some(artifact);
        Ok(())
    }

    /// `Submitted | Polling -> Failed`.
    pub fn fail(&mut self, error: JobError) -> Result<(), CoreError> {
        self.transition(JobState::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// `Submitted | Polling -> Cancelled`.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        self.transition(JobState::Cancelled)
    }

    fn transition(&mut self, to: JobState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn artifact() -> Artifact {
        Artifact::new(vec![1u8, 2, 3], Some("video/mp4".into()), "ref-1".into())
    }

    fn polling_job() -> Job {
        let mut job = Job::new(GenerationRequest::text("a red bicycle"));
        job.begin_polling(ProviderJobId::new("operations/1")).unwrap();
        job
    }

    #[test]
    fn new_job_starts_submitted() {
        let job = Job::new(GenerationRequest::text("x"));
        assert_eq!(job.state(), JobState::Submitted);
        assert!(job.provider_id().is_none());
        assert!(job.result().is_none());
        assert!(job.error().is_none());
        assert!(job.finished_at().is_none());
    }

    #[test]
    fn begin_polling_records_provider_id() {
        let job = polling_job();
        assert_eq!(job.state(), JobState::Polling);
        assert_eq!(job.provider_id().unwrap().as_str(), "operations/1");
    }

    #[test]
    fn begin_polling_twice_is_rejected() {
        let mut job = polling_job();
        let err = job
            .begin_polling(ProviderJobId::new("operations/2"))
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::InvalidTransition { from: JobState::Polling, to: JobState::Polling }
        );
        assert_eq!(job.provider_id().unwrap().as_str(), "operations/1");
    }

    #[test]
    fn record_poll_counts_only_while_polling() {
        let mut job = Job::new(GenerationRequest::text("x"));
        assert!(job.record_poll().is_err());
        job.begin_polling(ProviderJobId::new("op")).unwrap();
        assert_eq!(job.record_poll().unwrap(), 1);
        assert_eq!(job.record_poll().unwrap(), 2);
        job.cancel().unwrap();
        assert!(job.record_poll().is_err());
        assert_eq!(job.poll_count(), 2);
    }

    #[test]
    fn succeed_sets_result_and_finish_time() {
        let mut job = polling_job();
        job.succeed(artifact()).unwrap();
        assert_eq!(job.state(), JobState::Succeeded);
        assert_eq!(job.result().unwrap().len(), 3);
        assert!(job.error().is_none());
        assert!(job.finished_at().is_some());
    }

    #[test]
    fn cannot_succeed_from_submitted() {
        let mut job = Job::new(GenerationRequest::text("x"));
        assert!(job.succeed(artifact()).is_err());
        assert_eq!(job.state(), JobState::Submitted);
    }

    #[test]
    fn fail_from_submitted_and_polling() {
        let mut submitted = Job::new(GenerationRequest::text("x"));
        submitted
            .fail(JobError::new(JobErrorKind::Quota, "quota"))
            .unwrap();
        assert_eq!(submitted.state(), JobState::Failed);

        let mut polling = polling_job();
        polling
            .fail(JobError::new(JobErrorKind::NoResult, "empty"))
            .unwrap();
        assert_eq!(polling.error().unwrap().kind, JobErrorKind::NoResult);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = polling_job();
        job.cancel().unwrap();

        assert!(job.succeed(artifact()).is_err());
        assert!(job.fail(JobError::new(JobErrorKind::Transient, "late")).is_err());
        assert!(job.cancel().is_err());

        assert_eq!(job.state(), JobState::Cancelled);
        assert!(job.result().is_none());
        assert!(job.error().is_none());
    }

    #[test]
    fn failed_job_keeps_first_error() {
        let mut job = polling_job();
        job.fail(JobError::new(JobErrorKind::Credential, "first"))
            .unwrap();
        assert!(job
            .fail(JobError::new(JobErrorKind::Transient, "second"))
            .is_err());
        assert_eq!(job.error().unwrap().message, "first");
    }

    #[test]
    fn transition_table() {
        use JobState::*;
        assert!(Submitted.can_transition_to(Polling));
        assert!(Submitted.can_transition_to(Failed));
        assert!(Submitted.can_transition_to(Cancelled));
        assert!(!Submitted.can_transition_to(Succeeded));
        assert!(Polling.can_transition_to(Succeeded));
        assert!(!Polling.can_transition_to(Submitted));
        for terminal in [Succeeded, Failed, Cancelled] {
            for to in [Submitted, Polling, Succeeded, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn core_error_maps_to_job_error_kind() {
        let err: JobError = CoreError::Validation("bad".into()).into();
        assert_eq!(err.kind, JobErrorKind::Validation);
        let err: JobError = CoreError::Credential("missing".into()).into();
        assert_eq!(err.kind, JobErrorKind::Credential);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&JobErrorKind::NoResult).unwrap();
        assert_eq!(json, r#""no_result""#);
    }
}
