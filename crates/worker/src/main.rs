//! `vidforge-worker` -- submit one video generation job and wait for it.
//!
//! Submits the prompt (and optional reference image) to Gemini Veo, polls
//! the long-running operation until it finishes, and writes the video to
//! `OUTPUT_DIR`. Ctrl-C cancels the job locally.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default | Description                          |
//! |------------------------|----------|---------|--------------------------------------|
//! | `GEMINI_API_KEY`       | yes      | --      | API key sent as `x-goog-api-key`     |
//! | `GEMINI_API_URL`       | no       | Gemini v1beta | REST base URL                  |
//! | `POLL_INTERVAL_SECS`   | no       | `10`    | Seconds between status calls         |
//! | `REQUEST_TIMEOUT_SECS` | no       | `60`    | Per-request HTTP timeout             |
//! | `OUTPUT_DIR`           | no       | `.`     | Where the finished video is written  |

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidforge_client::gemini::GeminiVideoApi;
use vidforge_core::credential::StaticCredentialProvider;
use vidforge_core::history::{HistoryStore, InMemoryHistoryStore};
use vidforge_core::job::JobState;
use vidforge_poller::{JobPoller, PollerConfig};
use vidforge_worker::cli::Invocation;
use vidforge_worker::config::WorkerConfig;
use vidforge_worker::output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidforge_worker=info,vidforge_poller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    let invocation = Invocation::parse(std::env::args().skip(1))?;
    let request = invocation.load_request().await?;

    tracing::info!(
        api_url = %config.api_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        has_image = request.reference_image.is_some(),
        "Starting vidforge-worker",
    );

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let api = Arc::new(GeminiVideoApi::with_client(
        http,
        config.api_url.clone(),
        config.api_key.clone(),
    ));
    let credentials = Arc::new(StaticCredentialProvider::new(config.api_key.clone()));
    let history = Arc::new(InMemoryHistoryStore::new());
    let poller = JobPoller::new(
        api,
        credentials,
        history.clone(),
        PollerConfig::with_poll_interval(config.poll_interval),
    );

    let handle = poller.submit(request).await;
    let job = tokio::select! {
        job = handle.wait() => job,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(job_id = %handle.id(), "Interrupted; cancelling job");
            poller.shutdown().await;
            handle.snapshot()
        }
    };

    // Not tracked any more when an interrupt already shut the poller down.
    let _ = poller.acknowledge(job.id()).await;

    for item in history.list() {
        tracing::info!(history_id = item.id, agent = ?item.agent_type, "Recorded in history");
    }

    match (job.state(), job.result(), job.error()) {
        (JobState::Succeeded, Some(artifact), _) => {
            let path = output::write_artifact(&config.output_dir, artifact)
                .await
                .with_context(|| format!("Failed to write video to {}", config.output_dir.display()))?;
            println!("{}", path.display());
            Ok(())
        }
        (JobState::Failed, _, Some(error)) => {
            anyhow::bail!("{} ({})", error.message, error.kind.user_action())
        }
        (state, _, _) => anyhow::bail!("Generation job ended as {state}"),
    }
}
