//! Core library for the feedback-intelligence pipeline service.
//!
//! This crate contains the pipeline's business logic: configuration,
//! domain model, storage, the durable job queue, the LLM client stack,
//! and the Updater/Gatekeeper/Orchestrator pipeline itself. Binary
//! crates (`fip-server`, `fip-cli`) wire these pieces together.

pub mod automation;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingress;
pub mod json_repair;
pub mod llm;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod transport;

pub use error::*;

/// Returns the version of the fip-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
