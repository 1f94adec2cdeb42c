//! Work-Item Emitter: the downstream interface the Orchestrator calls
//! once the Gatekeeper says a thread should produce a work item. Both
//! shapes — in-process calls or a separate queued topic — are
//! implemented here behind one trait so the Orchestrator never branches
//! on `WorkItemEmitMode` itself.
//!
//! Same shape as the [`crate::transport::Transport`] trait: a thin
//! async trait over a concrete HTTP implementation, constructed once at
//! startup and shared behind an `Arc<dyn _>`.

use crate::domain::WorkItemType;
use crate::error::EmitError;
use crate::queue::{Broker, WorkItemCreateJob};
use crate::transport::{Method, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CREATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates (or schedules the creation of) a work item for a thread.
#[async_trait]
pub trait WorkItemEmitter: Send + Sync {
    async fn create(
        &self,
        thread_id: i64,
        kind: WorkItemType,
        title: &str,
        body: &str,
        origin_message_public_id: Option<&str>,
    ) -> Result<String, EmitError>;
}

/// Calls a downstream HTTP creator directly and waits for its
/// `workItemPublicId` response.
pub struct InProcessEmitter {
    transport: Arc<dyn Transport>,
    create_url: String,
}

impl InProcessEmitter {
    pub fn new(transport: Arc<dyn Transport>, create_url: impl Into<String>) -> Self {
        Self {
            transport,
            create_url: create_url.into(),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkItemBody<'a> {
    thread_id: i64,
    #[serde(rename = "type")]
    kind: &'a str,
    title: &'a str,
    body: &'a str,
    origin_message_public_id: Option<&'a str>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkItemResponse {
    work_item_public_id: String,
}

#[async_trait]
impl WorkItemEmitter for InProcessEmitter {
    async fn create(
        &self,
        thread_id: i64,
        kind: WorkItemType,
        title: &str,
        body: &str,
        origin_message_public_id: Option<&str>,
    ) -> Result<String, EmitError> {
        let payload = CreateWorkItemBody {
            thread_id,
            kind: kind.as_str(),
            title,
            body,
            origin_message_public_id,
        };
        let body_bytes = serde_json::to_vec(&payload)
            .map_err(|e| EmitError::Transport(format!("encoding request: {e}")))?;

        let response = self
            .transport
            .request(
                Method::Post,
                &self.create_url,
                &[("content-type".to_string(), "application/json".to_string())],
                body_bytes,
                CREATE_TIMEOUT,
                CancellationToken::new(),
            )
            .await
            .map_err(|e| EmitError::Transport(e.to_string()))?;

        if !(200..300).contains(&response.status) {
            return Err(EmitError::Rejected {
                status: response.status,
                message: String::from_utf8_lossy(&response.bytes).to_string(),
            });
        }

        let parsed: CreateWorkItemResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| EmitError::Rejected {
                status: response.status,
                message: format!("unparseable response body: {e}"),
            })?;

        Ok(parsed.work_item_public_id)
    }
}

/// Publishes a `WorkItemCreateJob` onto the broker and returns
/// immediately. The public id is allocated by whatever out-of-process
/// consumer drains the queue, so this emitter hands back a placeholder
/// derived from the enqueue rather than a real work-item id; callers
/// that need the eventual id must look it up via the audit log once the
/// consumer has processed the job.
pub struct QueuedEmitter {
    broker: Arc<dyn Broker>,
}

impl QueuedEmitter {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl WorkItemEmitter for QueuedEmitter {
    async fn create(
        &self,
        thread_id: i64,
        kind: WorkItemType,
        title: &str,
        body: &str,
        origin_message_public_id: Option<&str>,
    ) -> Result<String, EmitError> {
        self.broker
            .enqueue_work_item(WorkItemCreateJob {
                thread_id,
                work_item_type: kind.as_str().to_string(),
                title: title.to_string(),
                body: body.to_string(),
                origin_message_public_id: origin_message_public_id.map(str::to_string),
                attempt: 0,
            })
            .await
            .map_err(|e| EmitError::Transport(e.to_string()))?;

        Ok(format!("pending:{thread_id}"))
    }
}
