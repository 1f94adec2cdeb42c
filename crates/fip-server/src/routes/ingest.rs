//! `POST /ingest/message`: thin extractor over
//! `fip_core::ingress::submit`. 202 on accepted-and-enqueued, 400 on
//! validation error, 409 when `messagePublicId` was already processed.
//! Returns before the pipeline runs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use fip_core::domain::{MessageSource, SenderType, Visibility};
use fip_core::ingress::{self, IngestOutcome, IngestRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMessageBody {
    thread_public_id: String,
    message_public_id: String,
    text: String,
    sender_type: SenderType,
    sender_name: Option<String>,
    visibility: Visibility,
    metadata: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestAcceptedResponse {
    thread_id: i64,
}

pub async fn ingest_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestMessageBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let req = IngestRequest {
        thread_public_id: body.thread_public_id,
        message_public_id: body.message_public_id,
        text: body.text,
        sender_type: body.sender_type,
        sender_name: body.sender_name,
        visibility: body.visibility,
        metadata: body.metadata,
        source: MessageSource::Api,
    };

    match ingress::submit(&state.db, state.broker.as_ref(), &state.config.ingress, req).await? {
        IngestOutcome::Accepted { thread_id } => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::to_value(IngestAcceptedResponse { thread_id }).unwrap()),
        )),
        IngestOutcome::Duplicate => Ok((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "messagePublicId already processed" })),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_body_deserializes_camel_case() {
        let raw = serde_json::json!({
            "threadPublicId": "thr_abc",
            "messagePublicId": "msg_1",
            "text": "it broke",
            "senderType": "user",
            "visibility": "public",
        });
        let body: IngestMessageBody = serde_json::from_value(raw).unwrap();
        assert_eq!(body.thread_public_id, "thr_abc");
        assert_eq!(body.sender_type, SenderType::User);
    }
}
