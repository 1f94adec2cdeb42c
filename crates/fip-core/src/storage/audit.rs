//! Append-only audit log, written by the Updater, Orchestrator, and
//! Gatekeeper-failure paths. Never mutated.

use super::DbPool;
use crate::domain::AuditLog;
use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct AuditLogRow {
    id: i64,
    entity_type: String,
    entity_id: i64,
    action: String,
    details: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<AuditLogRow> for AuditLog {
    fn from(row: AuditLogRow) -> Self {
        AuditLog {
            id: row.id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

/// Append one audit record. Callers pass `details` as a pre-built JSON
/// value rather than a typed struct, since audit payloads vary per
/// action (`threadstate_updated`, `threadstate_update_failed`,
/// `workitem_emit_failed`, ...).
///
/// Generic over the executor for the same reason as
/// [`super::threads::update_thread_state`]: callers that need the state
/// write and its audit row to land atomically pass the same open
/// transaction to both.
pub async fn append<'e, E>(
    executor: E,
    entity_type: &str,
    entity_id: i64,
    action: &str,
    details: Option<serde_json::Value>,
) -> Result<AuditLog, StorageError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row: AuditLogRow = sqlx::query_as(
        "INSERT INTO audit_logs (entity_type, entity_id, action, details) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, entity_type, entity_id, action, details, created_at",
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(action)
    .bind(details)
    .fetch_one(executor)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(AuditLog::from(row))
}

/// List audit records for one entity in chronological order, used by
/// tests asserting per-thread ordering.
pub async fn list_for_entity(
    pool: &DbPool,
    entity_type: &str,
    entity_id: i64,
) -> Result<Vec<AuditLog>, StorageError> {
    let rows: Vec<AuditLogRow> = sqlx::query_as(
        "SELECT id, entity_type, entity_id, action, details, created_at \
         FROM audit_logs WHERE entity_type = $1 AND entity_id = $2 ORDER BY created_at ASC, id ASC",
    )
    .bind(entity_type)
    .bind(entity_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(AuditLog::from).collect())
}
