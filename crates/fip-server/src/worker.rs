//! Pipeline worker loops, spawned onto a [`fip_core::automation::Runtime`]
//! from `main`.
//!
//! Each loop below is a plain `async fn` that checks the shared
//! `CancellationToken` on every iteration and is handed to
//! [`fip_core::automation::Runtime::spawn`] rather than managing its
//! own task handle.

use std::sync::Arc;
use std::time::Duration;

use fip_core::automation::scheduler_from_config;
use fip_core::pipeline::Orchestrator;
use fip_core::queue::Broker;
use tokio_util::sync::CancellationToken;

/// Poll interval when the queue is empty, to avoid a busy loop.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// One pipeline worker: dequeue an ingest job, run the orchestrator on
/// it, then ack / requeue / dead-letter depending on the outcome.
pub async fn run_pipeline_worker(
    worker_id: usize,
    broker: Arc<dyn Broker>,
    orchestrator: Arc<Orchestrator>,
    cancel: CancellationToken,
) {
    tracing::info!(worker_id, "pipeline worker starting");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let job = match broker.dequeue_ingest().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                if wait_or_stop(IDLE_POLL, &cancel).await {
                    break;
                }
                continue;
            }
            Err(err) => {
                tracing::error!(worker_id, error = %err, "dequeue_ingest failed");
                if wait_or_stop(IDLE_POLL, &cancel).await {
                    break;
                }
                continue;
            }
        };

        tracing::debug!(worker_id, thread_id = job.thread_id, attempt = job.attempt, "processing ingest job");

        match orchestrator.process_ingest_job(&job, cancel.clone()).await {
            Ok(()) => {
                if let Err(err) = orchestrator.ack(&job).await {
                    tracing::error!(worker_id, error = %err, "ack_ingest failed");
                }
            }
            Err(err) => {
                tracing::warn!(worker_id, thread_id = job.thread_id, error = %err, "pipeline job failed");
                if let Err(requeue_err) = orchestrator.requeue_or_dead_letter(&job).await {
                    tracing::error!(worker_id, error = %requeue_err, "requeue_or_dead_letter failed");
                }
            }
        }
    }

    tracing::info!(worker_id, "pipeline worker stopped");
}

/// Periodically promotes delayed ingest jobs whose backoff has elapsed
/// back onto the ready queue. Every worker process runs exactly one of
/// these; duplicate promotion across processes is harmless (it only
/// moves jobs that are already past their `ready_at`).
pub async fn run_delay_promoter(broker: Arc<dyn Broker>, cancel: CancellationToken) {
    let scheduler = scheduler_from_config(5, 0, 0);

    loop {
        if cancel.is_cancelled() {
            break;
        }
        match broker.promote_due_ingest().await {
            Ok(promoted) if promoted > 0 => {
                tracing::debug!(promoted, "promoted delayed ingest jobs");
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "promote_due_ingest failed"),
        }

        tokio::select! {
            _ = scheduler.tick() => {}
            _ = cancel.cancelled() => break,
        }
    }
}

/// Sleeps for `delay`, returning `true` if cancellation fired first.
async fn wait_or_stop(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = cancel.cancelled() => true,
    }
}
