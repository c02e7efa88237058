//! HTTP client for the Gemini long-running video endpoints.
//!
//! Wraps submission (`predictLongRunning`), operation polling, and artifact
//! download using [`reqwest`]. The API key travels in the `x-goog-api-key`
//! header on every call.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use vidforge_core::job::ProviderJobId;
use vidforge_core::request::GenerationRequest;

use crate::api::{
    ApiError, ArtifactRef, FetchedArtifact, GenerationApi, JobStatus, ServiceError,
};
use crate::messages::{parse_operation, ErrorEnvelope, PredictRequest, SubmitResponse};

/// Default base URL of the Gemini REST API.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the Gemini video API.
pub struct GeminiVideoApi {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl GeminiVideoApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL, e.g. [`DEFAULT_API_URL`].
    /// * `api_key` - Key sent with every call. `None` makes every call fail
    ///   with [`ApiError::Credential`] without touching the network.
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for sharing timeouts and connection pools).
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `{api_url}/models/{model}:predictLongRunning`
    pub fn submit_url(&self, model_id: &str) -> String {
        format!("{}/models/{}:predictLongRunning", self.api_url, model_id)
    }

    /// `{api_url}/{operation_name}`
    pub fn operation_url(&self, id: &ProviderJobId) -> String {
        format!("{}/{}", self.api_url, id.as_str().trim_start_matches('/'))
    }

    // ---- private helpers ----

    fn api_key(&self) -> Result<&str, ApiError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ApiError::Credential("No API key configured".to_string()))
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a classified [`ApiError`]
    /// carrying the service's error message on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_failure(status.as_u16(), body));
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Turn a non-2xx body into an [`ApiError`].
///
/// A Google error envelope is classified on its HTTP code, RPC status, and
/// message together; any other body is classified on the raw text.
fn classify_failure(status: u16, body: String) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => {
            let mut error = ServiceError::from(envelope.error);
            if error.message.is_empty() {
                error.message = body;
            }
            ApiError::from_service(status, error)
        }
        Err(_) => ApiError::from_status(status, body),
    }
}

#[async_trait]
impl GenerationApi for GeminiVideoApi {
    async fn submit_job(&self, request: &GenerationRequest) -> Result<ProviderJobId, ApiError> {
        let model_id = request.model.model_id().ok_or_else(|| {
            ApiError::InvalidRequest(format!("model {:?} is not available", request.model))
        })?;
        let key = self.api_key()?;

        let response = self
            .client
            .post(self.submit_url(model_id))
            .header(API_KEY_HEADER, key)
            .json(&PredictRequest::from(request))
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::debug!(operation = %submitted.name, model = model_id, "Video job submitted");

        Ok(ProviderJobId::new(submitted.name))
    }

    async fn job_status(&self, id: &ProviderJobId) -> Result<JobStatus, ApiError> {
        let key = self.api_key()?;

        let response = self
            .client
            .get(self.operation_url(id))
            .header(API_KEY_HEADER, key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        let operation =
            parse_operation(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(operation.into_status())
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<FetchedArtifact, ApiError> {
        let key = self.api_key()?;

        let response = self
            .client
            .get(&artifact.uri)
            .header(API_KEY_HEADER, key)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| artifact.mime_type.clone());
        let bytes = response.bytes().await?.to_vec();

        tracing::debug!(uri = %artifact.uri, size = bytes.len(), "Artifact downloaded");

        Ok(FetchedArtifact { bytes, mime_type })
    }
}
