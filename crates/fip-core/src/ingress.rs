//! Ingress adapter: accepts a new message from the system of record,
//! validates it, writes it, and enqueues a pipeline job.
//!
//! `routes/*.rs` do extraction and status mapping only; the actual work
//! happens in a plain async fn here that the axum handler calls. Kept
//! deliberately free of any `axum` dependency so it can be unit tested
//! and reused from `fip-cli`'s `ingest` subcommand.

use crate::config::IngressConfig;
use crate::domain::{MessageSource, SenderType, ThreadStatus, Visibility};
use crate::error::{IngressError, ValidationError};
use crate::queue::{Broker, IngestMessageJob};
use crate::storage::{messages, threads, DbPool};

/// One inbound message submission, already deserialized from whatever
/// wire format the caller used (HTTP JSON body, CLI flags, ...).
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub thread_public_id: String,
    pub message_public_id: String,
    pub text: String,
    pub sender_type: SenderType,
    pub sender_name: Option<String>,
    pub visibility: Visibility,
    pub metadata: Option<serde_json::Value>,
    /// Where the message originated. Not part of the HTTP request body
    /// shape, but `Message.source` is a required domain attribute, so
    /// the HTTP layer defaults it to `Api` (this endpoint is the
    /// system-of-record's ingestion path, not the widget iframe) when
    /// the caller omits it.
    pub source: MessageSource,
}

/// Result of a successful ingest call. The HTTP layer maps `Accepted`
/// to 202 and `Duplicate` to 409.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The message was new; a pipeline job was enqueued for `thread_id`.
    Accepted { thread_id: i64 },
    /// `message_public_id` had already been ingested; no-op.
    Duplicate,
}

fn validate(req: &IngestRequest, config: &IngressConfig) -> Result<(), ValidationError> {
    if req.thread_public_id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "threadPublicId".to_string(),
        });
    }
    if req.message_public_id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "messagePublicId".to_string(),
        });
    }
    if req.text.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "text".to_string(),
        });
    }
    if req.text.len() > config.max_text_bytes {
        return Err(ValidationError::TextTooLarge {
            limit: config.max_text_bytes,
            actual: req.text.len(),
        });
    }
    Ok(())
}

/// Default workspace attributed to a thread created implicitly on
/// first message, when the caller does not supply one. Single-tenant
/// deployments never need to think about this; multi-tenant deployments
/// should route requests through a layer that stamps a real workspace id
/// before calling `submit`.
const DEFAULT_WORKSPACE_ID: &str = "default";

/// Accept one inbound message: validate, resolve (or implicitly create)
/// the thread, write the message idempotently on `messagePublicId`, and
/// enqueue a pipeline job. Returns before the pipeline itself runs.
pub async fn submit(
    pool: &DbPool,
    broker: &dyn Broker,
    config: &IngressConfig,
    req: IngestRequest,
) -> Result<IngestOutcome, IngressError> {
    validate(&req, config)?;

    let thread = match threads::get_thread_by_public_id(pool, &req.thread_public_id).await? {
        Some(thread) => thread,
        None => {
            threads::create_thread(
                pool,
                &req.thread_public_id,
                DEFAULT_WORKSPACE_ID,
                "",
                req.source.to_string().as_str(),
            )
            .await?
        }
    };

    let inserted = messages::insert_message_if_new(
        pool,
        &req.message_public_id,
        thread.id,
        req.source,
        req.sender_type,
        req.sender_name.as_deref(),
        req.visibility,
        &req.text,
        req.metadata,
    )
    .await?;

    if inserted.is_none() {
        return Ok(IngestOutcome::Duplicate);
    }

    // A thread parked on WaitingOnUser reopens the moment the *user*
    // replies, before the pipeline even runs: this transition is
    // ingress-driven and scoped to any new user message, since an
    // internal note from an agent must not reopen a thread that's
    // waiting on the customer. Best-effort: if
    // the CAS loses to a concurrent writer, the Orchestrator's own
    // status transition will still land correctly on its next pass.
    if thread.status == ThreadStatus::WaitingOnUser && req.sender_type == SenderType::User {
        let _ = threads::transition_status(pool, thread.id, thread.updated_at, ThreadStatus::Open).await?;
    }

    broker
        .enqueue_ingest(IngestMessageJob {
            thread_id: thread.id,
            message_public_id: req.message_public_id,
            attempt: 0,
        })
        .await?;

    Ok(IngestOutcome::Accepted { thread_id: thread.id })
}
