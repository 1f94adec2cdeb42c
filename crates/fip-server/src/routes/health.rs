//! `GET /health`: unconditional liveness, never reflects dependency
//! state. `/ready` is the dependency-aware counterpart.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<Utc>,
    uptime_sec: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        uptime_sec: state.started_at.elapsed().as_secs(),
    })
}
