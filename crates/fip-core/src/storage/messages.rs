//! CRUD operations for `feedback_messages`.

use super::DbPool;
use crate::domain::{Message, MessageSource, SenderType, Visibility};
use crate::error::StorageError;
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    public_id: String,
    thread_id: i64,
    source: String,
    sender_type: String,
    sender_name: Option<String>,
    visibility: String,
    text: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StorageError;

    fn try_from(row: MessageRow) -> Result<Self, StorageError> {
        let decode_err = |field: &str, value: &str| StorageError::Query {
            source: sqlx::Error::Decode(format!("invalid {field} '{value}'").into()),
        };

        let source = row
            .source
            .parse::<MessageSource>()
            .map_err(|_| decode_err("message source", &row.source))?;
        let sender_type = row
            .sender_type
            .parse::<SenderType>()
            .map_err(|_| decode_err("sender type", &row.sender_type))?;
        let visibility = row
            .visibility
            .parse::<Visibility>()
            .map_err(|_| decode_err("visibility", &row.visibility))?;

        Ok(Message {
            id: row.id,
            public_id: row.public_id,
            thread_id: row.thread_id,
            source,
            sender_type,
            sender_name: row.sender_name,
            visibility,
            text: row.text,
            metadata: row.metadata,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Insert a new message. Returns `None` if `public_id` already exists,
/// implementing the ingress adapter's idempotency-on-`messagePublicId`
/// requirement without a separate existence check racing the insert.
pub async fn insert_message_if_new(
    pool: &DbPool,
    public_id: &str,
    thread_id: i64,
    source: MessageSource,
    sender_type: SenderType,
    sender_name: Option<&str>,
    visibility: Visibility,
    text: &str,
    metadata: Option<serde_json::Value>,
) -> Result<Option<Message>, StorageError> {
    let row: Option<MessageRow> = sqlx::query_as(
        "INSERT INTO feedback_messages \
         (public_id, thread_id, source, sender_type, sender_name, visibility, text, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (public_id) DO NOTHING \
         RETURNING id, public_id, thread_id, source, sender_type, sender_name, visibility, text, metadata, created_at, deleted_at",
    )
    .bind(public_id)
    .bind(thread_id)
    .bind(source.to_string())
    .bind(sender_type.to_string())
    .bind(sender_name)
    .bind(visibility.to_string())
    .bind(text)
    .bind(metadata)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    row.map(Message::try_from).transpose()
}

/// Load every (non-deleted) message for a thread in
/// `(created_at ASC, id ASC)` order, the ordering the Updater relies on
/// when it reprocesses the full conversation.
pub async fn list_messages_for_thread(pool: &DbPool, thread_id: i64) -> Result<Vec<Message>, StorageError> {
    let rows: Vec<MessageRow> = sqlx::query_as(
        "SELECT id, public_id, thread_id, source, sender_type, sender_name, visibility, text, metadata, created_at, deleted_at \
         FROM feedback_messages \
         WHERE thread_id = $1 AND deleted_at IS NULL \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(thread_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    rows.into_iter().map(Message::try_from).collect()
}

/// Append a system-generated internal message (e.g. a work-item
/// suggestion chip), used by the Orchestrator after a successful emit.
pub async fn insert_system_message(
    pool: &DbPool,
    public_id: &str,
    thread_id: i64,
    text: &str,
    metadata: serde_json::Value,
) -> Result<Message, StorageError> {
    let row: MessageRow = sqlx::query_as(
        "INSERT INTO feedback_messages \
         (public_id, thread_id, source, sender_type, sender_name, visibility, text, metadata) \
         VALUES ($1, $2, 'other', 'internal', NULL, 'internal', $3, $4) \
         RETURNING id, public_id, thread_id, source, sender_type, sender_name, visibility, text, metadata, created_at, deleted_at",
    )
    .bind(public_id)
    .bind(thread_id)
    .bind(text)
    .bind(metadata)
    .fetch_one(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Message::try_from(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_row_rejects_invalid_source() {
        let row = MessageRow {
            id: 1,
            public_id: "msg_1".to_string(),
            thread_id: 1,
            source: "telegram".to_string(),
            sender_type: "user".to_string(),
            sender_name: None,
            visibility: "public".to_string(),
            text: "hi".to_string(),
            metadata: None,
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(Message::try_from(row).is_err());
    }
}
