//! Generation-service client library.
//!
//! Defines the [`GenerationApi`](api::GenerationApi) contract the poller
//! drives, the Gemini wire types, and a `reqwest`-backed implementation of
//! the long-running video endpoints.

pub mod api;
pub mod gemini;
pub mod messages;
