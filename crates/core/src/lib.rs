//! Domain types for long-running generation jobs.
//!
//! Holds the [`Job`](job::Job) state machine, the request model and its
//! validation, the history store, and the credential-provider seam. Nothing
//! in this crate performs I/O against the remote generation service.

pub mod credential;
pub mod error;
pub mod history;
pub mod job;
pub mod request;
pub mod types;
