//! Orchestrator: the worker-visible entry point that runs one ingest
//! job end to end — acquire the thread's lease, run the Updater, gate
//! the result, optionally emit a work item, transition status, release
//! the lease.
//!
//! Same dequeue → process → ack/requeue background-task loop shape as
//! other worker-pool services, replumbed onto this service's
//! Updater/Gatekeeper/Emitter triad.

use super::emitter::WorkItemEmitter;
use super::gatekeeper::{gate, GateDecision};
use super::lease::PerThreadLeases;
use super::updater::update_full_context;
use crate::domain::{Thread, ThreadState, ThreadStatus};
use crate::error::PipelineError;
use crate::llm::RetryingLlmClient;
use crate::queue::{requeue_delay_for_attempt, Broker, IngestMessageJob};
use crate::storage::{audit, messages, threads, DbPool};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Deterministic fingerprint of a `ThreadState`, used to dedup work-item
/// emission: at most one work item per `(threadId, stateFingerprint)`
/// pair. Two states that serialize identically fingerprint identically,
/// regardless of when they were computed.
fn state_fingerprint(state: &ThreadState) -> String {
    let json = serde_json::to_string(state).expect("ThreadState always serializes");
    let mut hasher = DefaultHasher::new();
    json.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Has a work item already been emitted for this exact thread state?
/// Scans the thread's audit trail for a prior `workitem_emitted` entry
/// carrying the same fingerprint. Linear in the thread's audit history,
/// which is acceptable: audit volume per thread is bounded by message
/// volume, not by global load.
async fn already_emitted_for(
    pool: &DbPool,
    thread_id: i64,
    fingerprint: &str,
) -> Result<bool, PipelineError> {
    let entries = audit::list_for_entity(pool, "thread", thread_id).await?;
    Ok(entries.iter().any(|entry| {
        entry.action == "workitem_emitted"
            && entry
                .details
                .as_ref()
                .and_then(|d| d.get("stateFingerprint"))
                .and_then(|v| v.as_str())
                == Some(fingerprint)
    }))
}

/// Runs the pipeline for one ingest job. Owns the per-thread lease,
/// the Updater call, the Gatekeeper decision, the emit attempt, and the
/// status transition; leaves requeue/dead-letter decisions for its
/// worker-loop caller to apply based on the returned error.
pub struct Orchestrator {
    pool: DbPool,
    llm: Arc<RetryingLlmClient>,
    broker: Arc<dyn Broker>,
    emitter: Arc<dyn WorkItemEmitter>,
    leases: Arc<PerThreadLeases>,
}

impl Orchestrator {
    pub fn new(
        pool: DbPool,
        llm: Arc<RetryingLlmClient>,
        broker: Arc<dyn Broker>,
        emitter: Arc<dyn WorkItemEmitter>,
        leases: Arc<PerThreadLeases>,
    ) -> Self {
        Self {
            pool,
            llm,
            broker,
            emitter,
            leases,
        }
    }

    /// Process one job to completion, or return the `PipelineError` that
    /// should drive the caller's requeue/dead-letter decision. A
    /// successful return means the thread reached a stable state and
    /// needs no further handling for this job.
    pub async fn process_ingest_job(
        &self,
        job: &IngestMessageJob,
        cancel: CancellationToken,
    ) -> Result<(), PipelineError> {
        let _lease = self.leases.acquire(job.thread_id).await;

        let thread = threads::get_thread(&self.pool, job.thread_id).await?;
        if thread.status.is_terminal_for_processing() {
            audit::append(
                &self.pool,
                "thread",
                job.thread_id,
                "pipeline_skipped_closed",
                None,
            )
            .await?;
            return Ok(());
        }

        let new_state =
            update_full_context(&self.pool, &self.llm, job.thread_id, cancel).await?;

        let decision = gate(&new_state);

        if decision.should_create {
            self.try_emit(&thread, &new_state, &decision).await?;
        }

        if decision.new_thread_status != thread.status {
            let current = threads::get_thread(&self.pool, job.thread_id).await?;
            let _applied = threads::transition_status(
                &self.pool,
                job.thread_id,
                current.updated_at,
                decision.new_thread_status,
            )
            .await?;
        }

        Ok(())
    }

    async fn try_emit(
        &self,
        thread: &Thread,
        state: &ThreadState,
        decision: &GateDecision,
    ) -> Result<(), PipelineError> {
        let fingerprint = state_fingerprint(state);
        if already_emitted_for(&self.pool, thread.id, &fingerprint).await? {
            return Ok(());
        }

        let kind = decision
            .work_item_type
            .expect("should_create implies work_item_type is set");
        let title = state
            .work_item_candidates
            .first()
            .map(|c| c.short_title.as_str())
            .unwrap_or(state.summary.as_str());
        let body = render_body(state);

        match self
            .emitter
            .create(thread.id, kind, title, &body, None)
            .await
        {
            Ok(work_item_public_id) => {
                audit::append(
                    &self.pool,
                    "thread",
                    thread.id,
                    "workitem_emitted",
                    Some(serde_json::json!({
                        "stateFingerprint": fingerprint,
                        "workItemPublicId": work_item_public_id,
                        "workItemType": kind.as_str(),
                    })),
                )
                .await?;

                let message_public_id = format!("sys_{}", Uuid::new_v4());
                messages::insert_system_message(
                    &self.pool,
                    &message_public_id,
                    thread.id,
                    "system_workitem_suggestion",
                    serde_json::json!({
                        "type": "system_workitem_suggestion",
                        "workItemPublicId": work_item_public_id,
                    }),
                )
                .await?;
            }
            Err(err) => {
                audit::append(
                    &self.pool,
                    "thread",
                    thread.id,
                    "workitem_emit_failed",
                    Some(serde_json::json!({
                        "stateFingerprint": fingerprint,
                        "reason": err.to_string(),
                    })),
                )
                .await?;
            }
        }

        Ok(())
    }

    /// Acknowledge successful completion of a job (removes it from the
    /// broker's active set).
    pub async fn ack(&self, job: &IngestMessageJob) -> Result<(), PipelineError> {
        self.broker.ack_ingest(job).await.map_err(Into::into)
    }

    /// Decide what to do with a job whose `process_ingest_job` call
    /// failed with `LlmUnavailable`: requeue with backoff, or dead-letter
    /// once the attempt ceiling is reached.
    pub async fn requeue_or_dead_letter(&self, job: &IngestMessageJob) -> Result<(), PipelineError> {
        let next_attempt = job.attempt + 1;
        match requeue_delay_for_attempt(job.attempt) {
            Some(delay) => {
                self.broker.requeue_ingest_delayed(job, delay).await?;
                Ok(())
            }
            None => {
                let thread_id = job.thread_id;
                self.broker
                    .dead_letter_ingest(job, "attempt ceiling reached")
                    .await?;
                Err(PipelineError::DeadLettered {
                    thread_id,
                    attempts: next_attempt,
                })
            }
        }
    }
}

fn render_body(state: &ThreadState) -> String {
    let mut body = state.summary.clone();
    if !state.repro_steps.is_empty() {
        body.push_str("\n\nSteps to reproduce:\n");
        for (i, step) in state.repro_steps.iter().enumerate() {
            body.push_str(&format!("{}. {}\n", i + 1, step));
        }
    }
    if let Some(expected) = &state.expected_behavior {
        body.push_str(&format!("\nExpected: {expected}\n"));
    }
    if let Some(actual) = &state.actual_behavior {
        body.push_str(&format!("Actual: {actual}\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Recommendation, RecommendationAction, WorkItemCandidate, WorkItemType};

    #[test]
    fn fingerprint_is_stable_across_calls() {
        let state = ThreadState::default();
        assert_eq!(state_fingerprint(&state), state_fingerprint(&state));
    }

    #[test]
    fn fingerprint_changes_when_state_changes() {
        let mut a = ThreadState::default();
        let mut b = ThreadState::default();
        a.summary = "a".to_string();
        b.summary = "b".to_string();
        assert_ne!(state_fingerprint(&a), state_fingerprint(&b));
    }

    #[test]
    fn render_body_includes_repro_steps_in_order() {
        let mut state = ThreadState::default();
        state.summary = "crashes on save".to_string();
        state.repro_steps = vec!["open app".to_string(), "click save".to_string()];
        let body = render_body(&state);
        assert!(body.contains("1. open app"));
        assert!(body.contains("2. click save"));
    }

    #[test]
    fn gate_decision_for_high_confidence_bug_requests_emission() {
        let mut state = ThreadState::default();
        state.recommendation = Recommendation {
            action: RecommendationAction::CreateBugWorkItem,
            reason: "crash reported twice".to_string(),
            confidence: 0.9,
        };
        state.work_item_candidates.push(WorkItemCandidate {
            kind: WorkItemType::Bug,
            short_title: "crash on save".to_string(),
            reason: "crash reported twice".to_string(),
            confidence: 0.9,
        });
        let decision = gate(&state);
        assert!(decision.should_create);
    }
}
