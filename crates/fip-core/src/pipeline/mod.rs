//! The Updater / Gatekeeper / Orchestrator pipeline: the part of the
//! service that turns a newly-ingested message into an updated
//! `ThreadState` and, optionally, a work-item suggestion.
//!
//! Structured as a composition of steps run by a background task,
//! generalized to this service's update → gate → emit sequence.

pub mod emitter;
pub mod gatekeeper;
pub mod lease;
pub mod orchestrator;
pub mod updater;

pub use emitter::WorkItemEmitter;
pub use gatekeeper::{gate, GateDecision};
pub use lease::PerThreadLeases;
pub use orchestrator::Orchestrator;
pub use updater::update_full_context;
