use std::path::PathBuf;
use std::time::Duration;

use vidforge_client::gemini::DEFAULT_API_URL;
use vidforge_poller::config::DEFAULT_POLL_INTERVAL;

/// Default timeout for a single HTTP request to the generation service.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Gemini API key; `None` when unset or blank.
    pub api_key: Option<String>,
    /// Base URL of the Gemini REST API.
    pub api_url: String,
    /// Delay between two status calls.
    pub poll_interval: Duration,
    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
    /// Directory the finished video is written to.
    pub output_dir: PathBuf,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                            |
    /// |------------------------|----------------------------------------------------|
    /// | `GEMINI_API_KEY`       | unset                                              |
    /// | `GEMINI_API_URL`       | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `POLL_INTERVAL_SECS`   | `10`                                               |
    /// | `REQUEST_TIMEOUT_SECS` | `60`                                               |
    /// | `OUTPUT_DIR`           | `.`                                                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());

        let api_url = lookup("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());

        let poll_interval = match lookup("POLL_INTERVAL_SECS") {
            Some(value) => Duration::from_secs(parse_secs("POLL_INTERVAL_SECS", &value)?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let request_timeout = Duration::from_secs(match lookup("REQUEST_TIMEOUT_SECS") {
            Some(value) => parse_secs("REQUEST_TIMEOUT_SECS", &value)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        });

        let output_dir = lookup("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            api_key,
            api_url,
            poll_interval,
            request_timeout,
            output_dir,
        })
    }
}

/// A positive whole number of seconds.
fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

/// Errors raised while assembling the worker's inputs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive number of seconds, got {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0}")]
    Usage(String),

    #[error("Failed to read reference image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Request(#[from] vidforge_core::error::CoreError),
}
