//! The generation-service contract consumed by the poller.
//!
//! [`GenerationApi`] is the only way the rest of the workspace talks to the
//! remote service. The HTTP implementation lives in
//! [`crate::gemini`]; tests substitute a scripted fake.

use async_trait::async_trait;
use vidforge_core::job::{JobErrorKind, ProviderJobId};
use vidforge_core::request::GenerationRequest;

/// Message the service returns when the selected API key does not exist.
pub const ENTITY_NOT_FOUND_MESSAGE: &str = "Requested entity was not found";
/// Message the service returns for a malformed or revoked API key.
pub const INVALID_KEY_MESSAGE: &str = "API key not valid";
/// Status string the service uses for exhausted quota.
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Start a long-running job. Returns the service-assigned id.
    async fn submit_job(&self, request: &GenerationRequest) -> Result<ProviderJobId, ApiError>;

    /// Fetch the current status of a previously submitted job.
    async fn job_status(&self, id: &ProviderJobId) -> Result<JobStatus, ApiError>;

    /// Download a finished artifact.
    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<FetchedArtifact, ApiError>;
}

/// Where a finished artifact can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub uri: String,
    pub mime_type: Option<String>,
}

impl ArtifactRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
        }
    }
}

/// An operation-level failure reported inside a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: Option<i32>,
    pub status: Option<String>,
    pub message: String,
}

impl ServiceError {
    /// Whether the service rejected the credential rather than the job.
    pub fn is_credential(&self) -> bool {
        is_credential_message(&self.message)
            || matches!(self.code, Some(401 | 403))
            || self.status.as_deref() == Some("UNAUTHENTICATED")
    }

    /// Whether the service refused the call for exhausted quota.
    pub fn is_quota(&self) -> bool {
        self.code == Some(429)
            || self.status.as_deref() == Some(RESOURCE_EXHAUSTED)
            || self.message.contains(RESOURCE_EXHAUSTED)
    }
}

/// One observation of a job's progress.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobStatus {
    pub done: bool,
    pub artifact: Option<ArtifactRef>,
    pub error: Option<ServiceError>,
    /// Safety-filter reasons the service gave for withholding output.
    pub filtered_reasons: Vec<String>,
}

impl JobStatus {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn completed(artifact: ArtifactRef) -> Self {
        Self {
            done: true,
            artifact: Some(artifact),
            ..Default::default()
        }
    }

    /// Done, but nothing to retrieve.
    pub fn completed_empty() -> Self {
        Self {
            done: true,
            ..Default::default()
        }
    }

    pub fn failed(error: ServiceError) -> Self {
        Self {
            done: true,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Downloaded artifact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Errors from the generation-service client layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The credential is missing or was rejected by the service.
    #[error("Credential rejected: {0}")]
    Credential(String),

    /// The service refused the call because a quota is exhausted.
    #[error("Quota exhausted: {0}")]
    Quota(String),

    /// The request cannot be expressed against this service.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classify a non-2xx response.
    pub fn from_status(status: u16, body: String) -> Self {
        if matches!(status, 401 | 403) || is_credential_message(&body) {
            Self::Credential(body)
        } else if status == 429 || body.contains(RESOURCE_EXHAUSTED) {
            Self::Quota(body)
        } else {
            Self::Status { status, body }
        }
    }

    /// Classify a non-2xx response whose body carried a structured error.
    ///
    /// The HTTP code, the RPC status, and the message are all considered.
    pub fn from_service(status: u16, error: ServiceError) -> Self {
        if matches!(status, 401 | 403) || error.is_credential() {
            Self::Credential(error.message)
        } else if status == 429 || error.is_quota() {
            Self::Quota(error.message)
        } else {
            Self::Status {
                status,
                body: error.message,
            }
        }
    }

    /// The job error kind this failure maps to during submission or polling.
    pub fn kind(&self) -> JobErrorKind {
        match self {
            Self::Credential(_) => JobErrorKind::Credential,
            Self::Quota(_) => JobErrorKind::Quota,
            Self::InvalidRequest(_) => JobErrorKind::Validation,
            Self::Request(_) | Self::Status { .. } | Self::InvalidResponse(_) => {
                JobErrorKind::Transient
            }
        }
    }
}

fn is_credential_message(text: &str) -> bool {
    text.contains(ENTITY_NOT_FOUND_MESSAGE) || text.contains(INVALID_KEY_MESSAGE)
}
