use std::time::Duration;

/// Default delay between two status calls for the same job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Tunable parameters for the poll loop.
///
/// There is no attempt ceiling or overall timeout: a job polls
/// until the service reports it done or the caller cancels it.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between two status calls for the same job.
    pub poll_interval: Duration,
    /// How long [`JobPoller::shutdown`](crate::JobPoller::shutdown) waits
    /// for each job task to exit.
    pub shutdown_grace: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl PollerConfig {
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Default::default()
        }
    }
}
