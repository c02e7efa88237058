//! Shared, observable job state.
//!
//! A [`JobCell`] is shared between the job's task and every handle to it.
//! Mutation goes through [`JobCell::apply`], which publishes the new state
//! on a watch channel so waiters wake on terminal transitions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use vidforge_core::error::CoreError;
use vidforge_core::job::{Job, JobState};
use vidforge_core::types::JobId;

pub(crate) struct JobCell {
    id: JobId,
    job: Mutex<Job>,
    state_tx: watch::Sender<JobState>,
}

impl JobCell {
    pub(crate) fn new(job: Job) -> Self {
        let (state_tx, _) = watch::channel(job.state());
        Self {
            id: job.id(),
            job: Mutex::new(job),
            state_tx,
        }
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn state(&self) -> JobState {
        self.lock().state()
    }

    pub(crate) fn snapshot(&self) -> Job {
        self.lock().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state_tx.subscribe()
    }

    /// Run a transition against the job and publish the resulting state.
    ///
    /// The lock is never held across an await point.
    pub(crate) fn apply<R>(
        &self,
        f: impl FnOnce(&mut Job) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let (result, state) = {
            let mut job = self.lock();
            let result = f(&mut job)?;
            (result, job.state())
        };
        self.state_tx.send_replace(state);
        Ok(result)
    }

    fn lock(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use vidforge_core::job::ProviderJobId;
    use vidforge_core::request::GenerationRequest;

    use super::*;

    #[tokio::test]
    async fn apply_publishes_new_state() {
        let cell = JobCell::new(Job::new(GenerationRequest::text("x")));
        let mut rx = cell.subscribe();

        cell.apply(|job| job.begin_polling(ProviderJobId::new("op")))
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), JobState::Polling);
    }

    #[test]
    fn failed_apply_leaves_state_untouched() {
        let cell = JobCell::new(Job::new(GenerationRequest::text("x")));
        cell.apply(|job| job.cancel()).unwrap();
        assert!(cell.apply(|job| job.cancel()).is_err());
        assert_eq!(cell.state(), JobState::Cancelled);
    }
}
