//! Access-credential seam.
//!
//! The poller asks a [`CredentialProvider`] before every submission. A
//! missing or rejected credential is surfaced as its own error kind so the
//! caller can re-run credential selection instead of retrying the job.

use async_trait::async_trait;

use crate::error::CoreError;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Whether a credential is currently selected.
    async fn has_credential(&self) -> bool;

    /// Ask the user (or environment) to select a credential.
    async fn request_credential(&self) -> Result<(), CoreError>;
}

/// Credential fixed at startup, typically read from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    api_key: Option<String>,
}

impl StaticCredentialProvider {
    /// Blank keys are treated as missing.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request_credential(&self) -> Result<(), CoreError> {
        if self.api_key.is_some() {
            Ok(())
        } else {
            Err(CoreError::Credential(
                "No API key configured; set GEMINI_API_KEY".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn configured_key_is_available() {
        let provider = StaticCredentialProvider::new(Some("secret".into()));
        assert!(provider.has_credential().await);
        assert!(provider.request_credential().await.is_ok());
        assert_eq!(provider.api_key(), Some("secret"));
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let provider = StaticCredentialProvider::new(Some("  ".into()));
        assert!(!provider.has_credential().await);
        assert_matches!(
            provider.request_credential().await,
            Err(CoreError::Credential(_))
        );
    }
}
