//! Job poller: submission, tracking, cancellation, and shutdown.
//!
//! [`JobPoller`] owns every in-flight job. [`JobPoller::submit`] runs the
//! local checks, then spawns one task per job that submits it, polls it
//! (see [`crate::tick`]), and records the terminal result in the history
//! store. Events are broadcast via a [`tokio::sync::broadcast`] channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use vidforge_client::api::GenerationApi;
use vidforge_core::credential::CredentialProvider;
use vidforge_core::error::CoreError;
use vidforge_core::history::{HistoryStore, NewHistoryItem};
use vidforge_core::job::{Artifact, Job, JobError, JobErrorKind, JobState};
use vidforge_core::request::GenerationRequest;
use vidforge_core::types::JobId;

use crate::cell::JobCell;
use crate::config::PollerConfig;
use crate::events::JobEvent;
use crate::tick::run_job;

/// Broadcast channel capacity for job events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// Everything a job task needs, shared by all tasks of one poller.
pub(crate) struct PollContext {
    pub(crate) api: Arc<dyn GenerationApi>,
    history: Arc<dyn HistoryStore>,
    event_tx: broadcast::Sender<JobEvent>,
    credential_invalidated: AtomicBool,
    pub(crate) poll_interval: Duration,
}

/// How a job left the `Polling` (or `Submitted`) state.
pub(crate) enum Terminal {
    Succeeded(Artifact),
    Failed(JobError),
}

impl PollContext {
    pub(crate) fn emit(&self, event: JobEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn credentials_invalidated(&self) -> bool {
        self.credential_invalidated.load(Ordering::Acquire)
    }

    /// Block further submissions until credentials are selected again.
    pub(crate) fn invalidate_credentials(&self, job_id: JobId) {
        self.credential_invalidated.store(true, Ordering::Release);
        tracing::warn!(%job_id, "Credential rejected; new submissions blocked until reselected");
        self.emit(JobEvent::CredentialRequired { job_id });
    }

    /// Move a job into a terminal state, then record and announce it.
    ///
    /// Returns `false` when the job had already left the state the caller
    /// observed (e.g. it was cancelled while a tick was in flight); in that
    /// case nothing is recorded or emitted.
    pub(crate) fn finish(&self, cell: &JobCell, terminal: Terminal, record_history: bool) -> bool {
        let job_id = cell.id();
        let applied = match terminal {
            Terminal::Succeeded(artifact) => cell.apply(|job| job.succeed(artifact)),
            Terminal::Failed(error) => cell.apply(|job| job.fail(error)),
        };
        if let Err(e) = applied {
            tracing::debug!(%job_id, error = %e, "Discarding result for job that already finished");
            return false;
        }

        let job = cell.snapshot();
        let history_id = if record_history {
            NewHistoryItem::from_job(&job).map(|item| self.history.append(item).id)
        } else {
            None
        };

        if let Some(artifact) = job.result() {
            tracing::info!(
                %job_id,
                polls = job.poll_count(),
                size_bytes = artifact.len(),
                history_id,
                "Generation job succeeded",
            );
            self.emit(JobEvent::Succeeded {
                job_id,
                size_bytes: artifact.len(),
                history_id,
            });
        } else if let Some(error) = job.error() {
            tracing::warn!(
                %job_id,
                kind = %error.kind,
                error = %error.message,
                polls = job.poll_count(),
                "Generation job failed",
            );
            self.emit(JobEvent::Failed {
                job_id,
                kind: error.kind,
                message: error.message.clone(),
            });
        }
        true
    }

    /// Cancel a job locally. The service is not notified.
    ///
    /// The job's token is cancelled before the state changes, so no new
    /// status or fetch call can start afterwards.
    pub(crate) fn cancel(&self, cell: &JobCell, token: &CancellationToken) -> JobState {
        token.cancel();
        match cell.apply(|job| job.cancel()) {
            Ok(()) => {
                tracing::info!(job_id = %cell.id(), "Generation job cancelled");
                self.emit(JobEvent::Cancelled { job_id: cell.id() });
                JobState::Cancelled
            }
            Err(_) => cell.state(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Caller-side handle to one job.
///
/// Cheap to clone. Dropping a handle does not cancel the job.
#[derive(Clone)]
pub struct JobHandle {
    cell: Arc<JobCell>,
    cancel: CancellationToken,
    ctx: Arc<PollContext>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.cell.id()
    }

    pub fn state(&self) -> JobState {
        self.cell.state()
    }

    /// Current copy of the job.
    pub fn snapshot(&self) -> Job {
        self.cell.snapshot()
    }

    /// Wait until the job reaches a terminal state and return it.
    pub async fn wait(&self) -> Job {
        let mut rx = self.cell.subscribe();
        // The sender lives in the cell this handle keeps alive, so the
        // channel cannot close while we wait.
        let _ = rx.wait_for(|state| state.is_terminal()).await;
        self.cell.snapshot()
    }

    /// Cancel the job if it is still `Submitted` or `Polling`.
    ///
    /// Returns the job's state afterwards; a terminal job is left as is.
    pub fn cancel(&self) -> JobState {
        self.ctx.cancel(&self.cell, &self.cancel)
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Internal bookkeeping for a single job.
struct TrackedJob {
    handle: JobHandle,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

/// Drives generation jobs from submission to a terminal state.
///
/// Created once and shared via `Arc`. Jobs are independent: a failing job
/// never affects another one.
///
/// Every submitted job, including ones rejected before reaching the
/// service, stays tracked until [`acknowledge`](Self::acknowledge) removes
/// it. Long-lived callers should acknowledge jobs once they have read the
/// terminal result.
pub struct JobPoller {
    ctx: Arc<PollContext>,
    credentials: Arc<dyn CredentialProvider>,
    config: PollerConfig,
    jobs: RwLock<HashMap<JobId, TrackedJob>>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

impl JobPoller {
    pub fn new(
        api: Arc<dyn GenerationApi>,
        credentials: Arc<dyn CredentialProvider>,
        history: Arc<dyn HistoryStore>,
        config: PollerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let ctx = Arc::new(PollContext {
            api,
            history,
            event_tx,
            credential_invalidated: AtomicBool::new(false),
            poll_interval: config.poll_interval,
        });

        Self {
            ctx,
            credentials,
            config,
            jobs: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.ctx.event_tx.subscribe()
    }

    /// Whether a credential rejection is blocking new submissions.
    pub fn credentials_invalidated(&self) -> bool {
        self.ctx.credentials_invalidated()
    }

    /// Submit a generation request.
    ///
    /// Validation and the credential check happen before this returns; a
    /// rejected request comes back already `Failed` and never reaches the
    /// service. Otherwise the returned handle starts in `Submitted` and a
    /// background task takes over.
    pub async fn submit(&self, request: GenerationRequest) -> JobHandle {
        let job = Job::new(request);
        let job_id = job.id();
        let cell = Arc::new(JobCell::new(job));
        let handle = JobHandle {
            cell: Arc::clone(&cell),
            cancel: self.cancel.child_token(),
            ctx: Arc::clone(&self.ctx),
        };

        if let Some(error) = self.precheck(&cell).await {
            let needs_credential = error.kind == JobErrorKind::Credential;
            self.ctx.finish(&cell, Terminal::Failed(error), false);
            if needs_credential {
                self.ctx.emit(JobEvent::CredentialRequired { job_id });
            }
            self.track(handle.clone(), None).await;
            return handle;
        }

        let ctx = Arc::clone(&self.ctx);
        let task_cell = Arc::clone(&cell);
        let task_cancel = handle.cancel.clone();
        let task_handle = tokio::spawn(async move {
            run_job(&ctx, &task_cell, &task_cancel).await;
            tracing::debug!(%job_id, "Job task exited");
        });

        self.track(handle.clone(), Some(task_handle)).await;
        handle
    }

    /// Cancel a tracked job by id.
    pub async fn cancel(&self, job_id: JobId) -> Result<JobState, PollerError> {
        let jobs = self.jobs.read().await;
        let tracked = jobs.get(&job_id).ok_or(PollerError::JobNotFound(job_id))?;
        Ok(tracked.handle.cancel())
    }

    /// Snapshot of a tracked job.
    pub async fn job(&self, job_id: JobId) -> Option<Job> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|tracked| tracked.handle.snapshot())
    }

    /// Handle to a tracked job.
    pub async fn handle(&self, job_id: JobId) -> Option<JobHandle> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|tracked| tracked.handle.clone())
    }

    /// Snapshots of every job not yet in a terminal state.
    pub async fn active_jobs(&self) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .map(|tracked| tracked.handle.snapshot())
            .filter(|job| !job.is_terminal())
            .collect()
    }

    /// Stop tracking a terminal job and hand it to the caller.
    pub async fn acknowledge(&self, job_id: JobId) -> Result<Job, PollerError> {
        let mut jobs = self.jobs.write().await;
        let tracked = jobs.get(&job_id).ok_or(PollerError::JobNotFound(job_id))?;
        let state = tracked.handle.state();
        if !state.is_terminal() {
            return Err(PollerError::NotFinished { job_id, state });
        }

        let tracked = jobs
            .remove(&job_id)
            .ok_or(PollerError::JobNotFound(job_id))?;
        Ok(tracked.handle.snapshot())
    }

    /// Run credential selection again and unblock submissions on success.
    pub async fn reselect_credentials(&self) -> Result<(), PollerError> {
        self.credentials.request_credential().await?;
        self.ctx.credential_invalidated.store(false, Ordering::Release);
        tracing::info!("Credentials reselected");
        Ok(())
    }

    /// Cancel every in-flight job and wait for their tasks to exit.
    ///
    /// Waits up to `shutdown_grace` per task.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job poller");
        self.cancel.cancel();

        let mut jobs = self.jobs.write().await;
        for (job_id, tracked) in jobs.drain() {
            tracked.handle.cancel();
            if let Some(task) = tracked.task_handle {
                if tokio::time::timeout(self.config.shutdown_grace, task)
                    .await
                    .is_err()
                {
                    tracing::warn!(%job_id, "Job task did not exit in time");
                }
            }
        }

        tracing::info!("Job poller shut down complete");
    }

    // ---- private helpers ----

    /// Local checks that must pass before the service is contacted.
    async fn precheck(&self, cell: &JobCell) -> Option<JobError> {
        if let Err(e) = cell.snapshot().request().ensure_submittable() {
            tracing::info!(job_id = %cell.id(), error = %e, "Generation request rejected");
            return Some(e.into());
        }

        if self.ctx.credentials_invalidated() || !self.credentials.has_credential().await {
            return Some(JobError::new(
                JobErrorKind::Credential,
                "Select an API key to continue",
            ));
        }

        None
    }

    async fn track(&self, handle: JobHandle, task_handle: Option<tokio::task::JoinHandle<()>>) {
        self.jobs.write().await.insert(
            handle.id(),
            TrackedJob {
                handle,
                task_handle,
            },
        );
    }
}

/// Errors from poller lookups and credential selection.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// No job with this id is tracked.
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    /// The job cannot be acknowledged before it finishes.
    #[error("Job {job_id} is still {state}")]
    NotFinished { job_id: JobId, state: JobState },

    /// Credential selection failed.
    #[error(transparent)]
    Credential(#[from] CoreError),
}
