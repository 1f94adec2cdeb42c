//! Durable job queue sitting between ingress and the pipeline workers.
//!
//! Persistence sits behind a trait ([`Broker`]) so the orchestrator can
//! be tested against an in-memory fake. The concrete implementation
//! ([`redis_broker::RedisBroker`]) pulls in `redis` + `deadpool-redis`
//! and builds a reliable queue on top of Redis list/sorted-set
//! primitives rather than a dedicated message-broker crate.

pub mod redis_broker;

pub use redis_broker::RedisBroker;

use crate::error::QueueError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A feedback message waiting to be folded into its thread's
/// cumulative state by the Updater/Gatekeeper/Orchestrator pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestMessageJob {
    pub thread_id: i64,
    pub message_public_id: String,
    pub attempt: u32,
}

/// A work item to create downstream. Only used when
/// `work_item.emit_mode = "queued"`; the in-process emitter never
/// touches the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemCreateJob {
    pub thread_id: i64,
    pub work_item_type: String,
    pub title: String,
    pub body: String,
    pub origin_message_public_id: Option<String>,
    pub attempt: u32,
}

/// Requeue delay grows as `min(60s * 2^attempt, 10min)`; once `attempt`
/// reaches 6 the job is dead-lettered instead of requeued (`None`).
pub fn requeue_delay_for_attempt(attempt: u32) -> Option<Duration> {
    const DEAD_LETTER_AT_ATTEMPT: u32 = 6;
    const MAX_DELAY: Duration = Duration::from_secs(600);

    if attempt >= DEAD_LETTER_AT_ATTEMPT {
        return None;
    }
    let secs = 60u64.saturating_mul(2u64.saturating_pow(attempt));
    Some(Duration::from_secs(secs).min(MAX_DELAY))
}

/// Job counts by state for one queue, surfaced on `/ready` as
/// `{waiting, active}` for both the ingest queue and the work-item queue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueDepth {
    /// Ready to be dequeued, plus delayed jobs not yet due.
    pub waiting: u64,
    /// Dequeued but not yet acked, requeued, or dead-lettered — i.e.
    /// currently being worked on by a pipeline worker.
    pub active: u64,
}

/// Full queue-depth snapshot for the readiness endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub ingest: QueueDepth,
    pub work_item: QueueDepth,
    /// Ingest jobs that exhausted their attempt ceiling.
    pub ingest_dead_letter: u64,
}

/// Abstraction over the durable job queue. Object-safe so the
/// orchestrator can hold an `Arc<dyn Broker>` and tests can substitute
/// an in-memory fake.
///
/// Ingest dequeue is reliable: `dequeue_ingest` atomically moves a job
/// from the ready list into a process-local "active" list, and the
/// caller must eventually call exactly one of [`Broker::ack_ingest`],
/// [`Broker::requeue_ingest_delayed`], or [`Broker::dead_letter_ingest`]
/// to remove it from that active list. A worker that crashes mid-job
/// leaves its job in the active list rather than silently dropping it
/// (visible via `queue_stats`'s `active` count; requeue of stuck active
/// jobs is an operator action, not automated, since the core cannot
/// distinguish "still processing" from "crashed" without a lease TTL).
#[async_trait]
pub trait Broker: Send + Sync {
    /// Enqueue a message for immediate pickup.
    async fn enqueue_ingest(&self, job: IngestMessageJob) -> Result<(), QueueError>;

    /// Pop the next ready ingest job, if any, moving it into the active
    /// set. Non-blocking; callers poll.
    async fn dequeue_ingest(&self) -> Result<Option<IngestMessageJob>, QueueError>;

    /// Acknowledge successful processing of a job returned by
    /// `dequeue_ingest`, removing it from the active set.
    async fn ack_ingest(&self, job: &IngestMessageJob) -> Result<(), QueueError>;

    /// Move a job (as returned by `dequeue_ingest`, i.e. still carrying
    /// its pre-retry `attempt`) out of the active set and schedule the
    /// attempt-incremented copy for retry after `delay`.
    async fn requeue_ingest_delayed(&self, job: &IngestMessageJob, delay: Duration) -> Result<(), QueueError>;

    /// Move a job out of the active set and onto the dead-letter list,
    /// out of the retry path entirely. `reason` is recorded alongside
    /// the job for operator inspection.
    async fn dead_letter_ingest(&self, job: &IngestMessageJob, reason: &str) -> Result<(), QueueError>;

    /// Move any delayed ingest jobs whose delay has elapsed onto the
    /// ready queue. Returns the number promoted. Workers call this once
    /// per poll cycle.
    async fn promote_due_ingest(&self) -> Result<usize, QueueError>;

    /// Enqueue a downstream work-item creation request.
    async fn enqueue_work_item(&self, job: WorkItemCreateJob) -> Result<(), QueueError>;

    /// Pop the next ready work-item job, if any, moving it into the active set.
    async fn dequeue_work_item(&self) -> Result<Option<WorkItemCreateJob>, QueueError>;

    /// Acknowledge successful processing of a work-item job.
    async fn ack_work_item(&self, job: &WorkItemCreateJob) -> Result<(), QueueError>;

    /// Job counts by state, for the `/ready` surface and for tests that
    /// assert on dead-letter behavior under circuit-breaker pressure.
    async fn queue_stats(&self) -> Result<QueueStats, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requeue_delay_grows_exponentially() {
        assert_eq!(requeue_delay_for_attempt(0), Some(Duration::from_secs(60)));
        assert_eq!(requeue_delay_for_attempt(1), Some(Duration::from_secs(120)));
        assert_eq!(requeue_delay_for_attempt(2), Some(Duration::from_secs(240)));
    }

    #[test]
    fn requeue_delay_caps_at_ten_minutes() {
        assert_eq!(requeue_delay_for_attempt(5), Some(Duration::from_secs(600)));
    }

    #[test]
    fn requeue_delay_dead_letters_at_attempt_six() {
        assert_eq!(requeue_delay_for_attempt(6), None);
        assert_eq!(requeue_delay_for_attempt(10), None);
    }
}
