//! Shared application state for the feedback-intelligence pipeline server.

use std::sync::Arc;
use std::time::Instant;

use fip_core::config::Config;
use fip_core::llm::RetryingLlmClient;
use fip_core::queue::Broker;
use fip_core::storage::DbPool;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// Postgres connection pool.
    pub db: DbPool,
    /// Durable job queue (Redis-backed in production).
    pub broker: Arc<dyn Broker>,
    /// Retrying, circuit-breaking LLM client, shared with the pipeline
    /// workers so `/ready` can cheaply read the breaker's state.
    pub llm: Arc<RetryingLlmClient>,
    /// The configuration the server was started with, kept for
    /// `/ready`'s ingress limits and for diagnostics.
    pub config: Config,
    /// When this process started, for `/health`'s `uptimeSec`.
    pub started_at: Instant,
}
