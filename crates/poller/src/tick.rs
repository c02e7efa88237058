//! Per-job task: submit, then poll on a fixed interval until terminal.
//!
//! Every remote call is raced against the job's cancellation token with a
//! `biased` select, so once the token fires no new status or fetch call
//! starts. Results that arrive for a job that already left `Polling` are
//! discarded by the `Job` transition checks.

use tokio_util::sync::CancellationToken;
use vidforge_client::api::{ApiError, ArtifactRef, JobStatus};
use vidforge_core::job::{Artifact, JobError, JobErrorKind, ProviderJobId};

use crate::cell::JobCell;
use crate::events::JobEvent;
use crate::poller::{PollContext, Terminal};

/// Message used when the service finishes without an artifact or a reason.
const NO_RESULT_MESSAGE: &str = "Operation completed, but no video link was returned";

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    /// The job is still running; schedule exactly one more tick.
    Continue,
    /// The job is terminal (or was cancelled); stop.
    Finished,
}

/// Drive one job from `Submitted` to a terminal state.
///
/// A job whose token fired before it reached a terminal state (for example
/// one submitted after shutdown) is moved to `Cancelled` on the way out.
pub(crate) async fn run_job(ctx: &PollContext, cell: &JobCell, cancel: &CancellationToken) {
    drive(ctx, cell, cancel).await;
    if cancel.is_cancelled() {
        ctx.cancel(cell, cancel);
    }
}

async fn drive(ctx: &PollContext, cell: &JobCell, cancel: &CancellationToken) {
    let Some(provider_id) = submit(ctx, cell, cancel).await else {
        return;
    };

    loop {
        if poll_tick(ctx, cell, cancel, &provider_id).await == TickOutcome::Finished {
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }
}

/// `Submitted -> Polling` or `Submitted -> Failed`. Never retried.
async fn submit(
    ctx: &PollContext,
    cell: &JobCell,
    cancel: &CancellationToken,
) -> Option<ProviderJobId> {
    let job_id = cell.id();
    let request = cell.snapshot().request().clone();

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return None,
        result = ctx.api.submit_job(&request) => result,
    };

    match result {
        Ok(provider_id) => {
            if cell
                .apply(|job| job.begin_polling(provider_id.clone()))
                .is_err()
            {
                return None;
            }
            tracing::info!(%job_id, provider_id = %provider_id, "Generation job submitted");
            ctx.emit(JobEvent::Submitted {
                job_id,
                provider_id: provider_id.to_string(),
            });
            Some(provider_id)
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "Failed to submit generation job");
            let kind = e.kind();
            if ctx.finish(cell, Terminal::Failed(JobError::new(kind, e.to_string())), true)
                && kind == JobErrorKind::Credential
            {
                ctx.invalidate_credentials(job_id);
            }
            None
        }
    }
}

/// One status call, plus the artifact download when the job is done.
async fn poll_tick(
    ctx: &PollContext,
    cell: &JobCell,
    cancel: &CancellationToken,
    provider_id: &ProviderJobId,
) -> TickOutcome {
    let job_id = cell.id();
    if cancel.is_cancelled() {
        return TickOutcome::Finished;
    }
    let Ok(attempt) = cell.apply(|job| job.record_poll()) else {
        return TickOutcome::Finished;
    };

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => return TickOutcome::Finished,
        status = ctx.api.job_status(provider_id) => status,
    };

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            fail_poll(ctx, cell, e);
            return TickOutcome::Finished;
        }
    };

    if !status.done {
        tracing::debug!(%job_id, attempt, "Generation job still running");
        ctx.emit(JobEvent::Polling { job_id, attempt });
        return TickOutcome::Continue;
    }

    finish_done(ctx, cell, cancel, status).await;
    TickOutcome::Finished
}

/// A status call failed outright.
fn fail_poll(ctx: &PollContext, cell: &JobCell, e: ApiError) {
    let job_id = cell.id();
    tracing::error!(%job_id, error = %e, "Status check failed");

    let kind = match e.kind() {
        JobErrorKind::Credential => JobErrorKind::Credential,
        _ => JobErrorKind::Transient,
    };
    if ctx.finish(cell, Terminal::Failed(JobError::new(kind, e.to_string())), true)
        && kind == JobErrorKind::Credential
    {
        ctx.invalidate_credentials(job_id);
    }
}

/// The service reported the job done: classify and materialize the result.
async fn finish_done(
    ctx: &PollContext,
    cell: &JobCell,
    cancel: &CancellationToken,
    status: JobStatus,
) {
    let job_id = cell.id();

    if let Some(error) = status.error {
        let credential = error.is_credential();
        let kind = if credential {
            JobErrorKind::Credential
        } else {
            JobErrorKind::Generation
        };
        if ctx.finish(cell, Terminal::Failed(JobError::new(kind, error.message)), true) && credential
        {
            ctx.invalidate_credentials(job_id);
        }
        return;
    }

    let Some(artifact_ref) = status.artifact else {
        let message = if status.filtered_reasons.is_empty() {
            NO_RESULT_MESSAGE.to_string()
        } else {
            status.filtered_reasons.join("; ")
        };
        ctx.finish(
            cell,
            Terminal::Failed(JobError::new(JobErrorKind::NoResult, message)),
            true,
        );
        return;
    };

    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        fetched = ctx.api.fetch_artifact(&artifact_ref) => fetched,
    };

    let terminal = match fetched {
        Ok(fetched) => Terminal::Succeeded(materialize(artifact_ref, fetched.bytes, fetched.mime_type)),
        Err(e) => {
            tracing::error!(%job_id, uri = %artifact_ref.uri, error = %e, "Artifact download failed");
            Terminal::Failed(JobError::new(
                JobErrorKind::Retrieval,
                format!("Failed to download the generated video: {e}"),
            ))
        }
    };
    ctx.finish(cell, terminal, true);
}

fn materialize(artifact_ref: ArtifactRef, bytes: Vec<u8>, mime_type: Option<String>) -> Artifact {
    Artifact::new(
        bytes,
        mime_type.or(artifact_ref.mime_type),
        artifact_ref.uri,
    )
}
