//! Generation request payload and its submission checks.
//!
//! A [`GenerationRequest`] is immutable once handed to the poller. The
//! checks in [`GenerationRequest::ensure_submittable`] run before any call
//! reaches the remote service.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Remote model identifier for the Veo video model.
pub const VEO_MODEL_ID: &str = "veo-3.1-fast-generate-preview";

/// Upper bound on videos requested per job.
pub const MAX_VIDEOS_PER_REQUEST: u8 = 4;

// ---------------------------------------------------------------------------
// Model selection
// ---------------------------------------------------------------------------

/// Which video model a request targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSelector {
    #[default]
    Veo,
    /// Listed as experimental and not wired to any backend.
    Sora,
}

impl ModelSelector {
    /// Remote model id, or `None` if the model cannot be submitted.
    pub fn model_id(self) -> Option<&'static str> {
        match self {
            Self::Veo => Some(VEO_MODEL_ID),
            Self::Sora => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Output configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

/// Output settings sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VideoConfig {
    #[validate(range(min = 1, max = 4))]
    pub number_of_videos: u8,
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            number_of_videos: 1,
            resolution: Resolution::default(),
            aspect_ratio: AspectRatio::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference image
// ---------------------------------------------------------------------------

/// An optional still image the video is generated from.
///
/// `data` holds the base64 payload without the `data:` URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReferenceImage {
    #[validate(length(min = 1))]
    pub mime_type: String,
    #[validate(length(min = 1))]
    pub data: String,
}

impl ReferenceImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, CoreError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::Validation("Reference image must be a data URL".into()))?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            CoreError::Validation("Reference image data URL has no payload".into())
        })?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            CoreError::Validation("Reference image data URL must be base64-encoded".into())
        })?;

        Ok(Self::new(mime_type, payload))
    }

    /// Render back to the data URL form kept in history entries.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Immutable input for one generation job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    pub prompt: String,
    #[validate(nested)]
    pub reference_image: Option<ReferenceImage>,
    pub model: ModelSelector,
    #[validate(nested)]
    pub config: VideoConfig,
}

impl GenerationRequest {
    /// Text-only request with default model and output settings.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    pub fn with_model(mut self, model: ModelSelector) -> Self {
        self.model = model;
        self
    }

    pub fn with_config(mut self, config: VideoConfig) -> Self {
        self.config = config;
        self
    }

    /// Check the request can be handed to the generation service.
    ///
    /// - the prompt must be non-blank, or a reference image must be present;
    /// - a reference image must carry an `image/*` MIME type and data;
    /// - the selected model must be available;
    /// - `number_of_videos` must be within `1..=MAX_VIDEOS_PER_REQUEST`.
    pub fn ensure_submittable(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() && self.reference_image.is_none() {
            return Err(CoreError::Validation(
                "Enter a description or attach a reference image".to_string(),
            ));
        }

        if let Some(image) = &self.reference_image {
            if !image.mime_type.starts_with("image/") {
                return Err(CoreError::Validation(format!(
                    "Reference image has unsupported MIME type '{}'",
                    image.mime_type
                )));
            }
        }

        if self.model.model_id().is_none() {
            return Err(CoreError::Validation(format!(
                "Model '{:?}' is not available",
                self.model
            )));
        }

        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
