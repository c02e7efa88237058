//! Command-line driver for the video generation poller.
//!
//! The binary in `main.rs` wires the Gemini client, the poller, and an
//! in-memory history store together; this library holds the parts that
//! can be tested without a network.

pub mod cli;
pub mod config;
pub mod output;
