//! Shared fakes for poller integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vidforge_client::api::{
    ApiError, ArtifactRef, FetchedArtifact, GenerationApi, JobStatus, ServiceError,
};
use vidforge_core::credential::CredentialProvider;
use vidforge_core::error::CoreError;
use vidforge_core::history::InMemoryHistoryStore;
use vidforge_core::job::ProviderJobId;
use vidforge_core::request::GenerationRequest;
use vidforge_poller::{JobPoller, PollerConfig};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Scripted generation API
// ---------------------------------------------------------------------------

/// Generation API that replays scripted responses and counts calls.
///
/// Once the status script runs out, every further status call reports the
/// job as still running.
#[derive(Default)]
pub struct ScriptedApi {
    submissions: Mutex<VecDeque<Result<ProviderJobId, ApiError>>>,
    statuses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
    fetches: Mutex<VecDeque<Result<FetchedArtifact, ApiError>>>,
    /// Time each status call takes to answer.
    status_delay: Option<Duration>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub fetched_uris: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: Vec<Result<JobStatus, ApiError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_submission(self, result: Result<ProviderJobId, ApiError>) -> Self {
        self.submissions.lock().unwrap().push_back(result);
        self
    }

    pub fn with_fetch(self, result: Result<FetchedArtifact, ApiError>) -> Self {
        self.fetches.lock().unwrap().push_back(result);
        self
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationApi for ScriptedApi {
    async fn submit_job(&self, request: &GenerationRequest) -> Result<ProviderJobId, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderJobId::new("models/veo/operations/test")))
    }

    async fn job_status(&self, _id: &ProviderJobId) -> Result<JobStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobStatus::running()))
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<FetchedArtifact, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_uris.lock().unwrap().push(artifact.uri.clone());
        self.fetches.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(FetchedArtifact {
                bytes: vec![0u8; 8],
                mime_type: Some("video/mp4".into()),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Credential provider
// ---------------------------------------------------------------------------

/// Credential provider whose selection state can be flipped by tests.
pub struct ToggleCredentials {
    selected: AtomicBool,
    pub requests: AtomicUsize,
}

impl ToggleCredentials {
    pub fn selected() -> Self {
        Self {
            selected: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self {
            selected: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialProvider for ToggleCredentials {
    async fn has_credential(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    async fn request_credential(&self) -> Result<(), CoreError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.selected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub struct Harness {
    pub api: Arc<ScriptedApi>,
    pub credentials: Arc<ToggleCredentials>,
    pub history: Arc<InMemoryHistoryStore>,
    pub poller: JobPoller,
}

pub fn harness(api: ScriptedApi) -> Harness {
    harness_with_credentials(api, ToggleCredentials::selected())
}

pub fn harness_with_credentials(api: ScriptedApi, credentials: ToggleCredentials) -> Harness {
    let api = Arc::new(api);
    let credentials = Arc::new(credentials);
    let history = Arc::new(InMemoryHistoryStore::new());
    let poller = JobPoller::new(
        api.clone(),
        credentials.clone(),
        history.clone(),
        PollerConfig::with_poll_interval(POLL_INTERVAL),
    );
    Harness {
        api,
        credentials,
        history,
        poller,
    }
}

pub fn done(uri: &str) -> Result<JobStatus, ApiError> {
    Ok(JobStatus::completed(ArtifactRef::new(uri)))
}

pub fn running() -> Result<JobStatus, ApiError> {
    Ok(JobStatus::running())
}

pub fn service_error(code: i32, message: &str) -> ServiceError {
    ServiceError {
        code: Some(code),
        status: None,
        message: message.to_string(),
    }
}
