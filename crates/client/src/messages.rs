//! Wire types for the Gemini long-running video endpoints.
//!
//! Submission sends a [`PredictRequest`] and receives an operation name.
//! Polling returns an [`Operation`] with the shape
//! `{"name", "done", "response": {"generateVideoResponse": {...}}, "error"}`,
//! which [`Operation::into_status`] reduces to a [`JobStatus`].

use serde::{Deserialize, Serialize};
use vidforge_core::request::GenerationRequest;

use crate::api::{ArtifactRef, JobStatus, ServiceError};

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<Instance>,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<InstanceImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub aspect_ratio: &'static str,
    pub resolution: &'static str,
    pub sample_count: u8,
}

impl From<&GenerationRequest> for PredictRequest {
    fn from(request: &GenerationRequest) -> Self {
        let image = request.reference_image.as_ref().map(|img| InstanceImage {
            bytes_base64_encoded: img.data.clone(),
            mime_type: img.mime_type.clone(),
        });

        Self {
            instances: vec![Instance {
                prompt: request.prompt.clone(),
                image,
            }],
            parameters: Parameters {
                aspect_ratio: request.config.aspect_ratio.as_str(),
                resolution: request.config.resolution.as_str(),
                sample_count: request.config.number_of_videos,
            },
        }
    }
}

/// Response to `predictLongRunning`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Operation name used for subsequent status calls.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Operation status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<OperationResult>,
    #[serde(default)]
    pub error: Option<RpcStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
    #[serde(default)]
    pub rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<VideoRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// `google.rpc.Status` as embedded in operations and error bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcStatus {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Top-level error body: `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: RpcStatus,
}

impl From<RpcStatus> for ServiceError {
    fn from(status: RpcStatus) -> Self {
        Self {
            code: status.code,
            status: status.status,
            message: status.message,
        }
    }
}

impl Operation {
    /// Reduce the operation to what the poller acts on.
    ///
    /// Only the first generated sample is used.
    pub fn into_status(self) -> JobStatus {
        if !self.done {
            return JobStatus::running();
        }
        if let Some(error) = self.error {
            return JobStatus::failed(error.into());
        }

        let video_response = self.response.and_then(|r| r.generate_video_response);
        let filtered_reasons = video_response
            .as_ref()
            .map(|v| v.rai_media_filtered_reasons.clone())
            .unwrap_or_default();

        let artifact = video_response
            .and_then(|v| v.generated_samples.into_iter().next())
            .and_then(|sample| sample.video)
            .and_then(|video| {
                video.uri.map(|uri| ArtifactRef {
                    uri,
                    mime_type: video.mime_type,
                })
            });

        JobStatus {
            done: true,
            artifact,
            error: None,
            filtered_reasons,
        }
    }
}

/// Parse an operation status body.
pub fn parse_operation(text: &str) -> Result<Operation, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
