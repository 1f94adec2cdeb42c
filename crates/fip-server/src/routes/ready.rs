//! `GET /ready`: 200 when Postgres and the broker both answer, 503
//! otherwise. LLM reachability is reported but never fails readiness —
//! the service degrades to queueing rather than going unready when only
//! the LLM is down.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use fip_core::queue::QueueDepth;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyChecks {
    postgres: bool,
    redis: bool,
    llm: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyQueues {
    ingest: QueueDepth,
    work_item: QueueDepth,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    status: &'static str,
    checks: ReadyChecks,
    queues: ReadyQueues,
    ingest_dead_letter: u64,
}

pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let postgres = fip_core::storage::ping(&state.db).await;
    let stats = state.broker.queue_stats().await;
    let redis = stats.is_ok();
    let llm = !state.llm.breaker_is_open();

    let queues = stats.unwrap_or_default();
    let body = ReadyResponse {
        status: if postgres && redis { "ready" } else { "not_ready" },
        checks: ReadyChecks { postgres, redis, llm },
        queues: ReadyQueues {
            ingest: queues.ingest,
            work_item: queues.work_item,
        },
        ingest_dead_letter: queues.ingest_dead_letter,
    };

    let status = if postgres && redis {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}
