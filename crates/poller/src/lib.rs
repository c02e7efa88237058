//! Asynchronous job poller for long-running generation jobs.
//!
//! [`JobPoller`](poller::JobPoller) submits a job, polls its status on a
//! fixed interval, downloads the finished artifact, and classifies the
//! terminal state. Each job runs in its own Tokio task with its own
//! cancellation token.

mod cell;
pub mod config;
pub mod events;
pub mod poller;
mod tick;

pub use config::PollerConfig;
pub use events::JobEvent;
pub use poller::{JobHandle, JobPoller, PollerError};
