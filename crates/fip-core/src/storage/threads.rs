//! CRUD operations for `feedback_threads`.

use super::DbPool;
use crate::domain::{Thread, ThreadState, ThreadStatus};
use crate::error::StorageError;
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: i64,
    public_id: String,
    workspace_id: String,
    title: String,
    status: String,
    primary_source: String,
    thread_state: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl TryFrom<ThreadRow> for Thread {
    type Error = StorageError;

    fn try_from(row: ThreadRow) -> Result<Self, StorageError> {
        let status = row.status.parse::<ThreadStatus>().map_err(|_| StorageError::Query {
            source: sqlx::Error::Decode(
                format!("invalid thread status '{}'", row.status).into(),
            ),
        })?;
        let thread_state: ThreadState =
            serde_json::from_value(row.thread_state).map_err(|e| StorageError::Query {
                source: sqlx::Error::Decode(Box::new(e)),
            })?;

        Ok(Thread {
            id: row.id,
            public_id: row.public_id,
            workspace_id: row.workspace_id,
            title: row.title,
            status,
            primary_source: row.primary_source,
            thread_state,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_activity_at: row.last_activity_at,
        })
    }
}

/// Create a new thread for the given workspace, seeded with the default
/// (empty) `ThreadState`. Returns the created row.
pub async fn create_thread(
    pool: &DbPool,
    public_id: &str,
    workspace_id: &str,
    title: &str,
    primary_source: &str,
) -> Result<Thread, StorageError> {
    let row: ThreadRow = sqlx::query_as(
        "INSERT INTO feedback_threads (public_id, workspace_id, title, primary_source, thread_state) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, public_id, workspace_id, title, status, primary_source, thread_state, created_at, updated_at, last_activity_at",
    )
    .bind(public_id)
    .bind(workspace_id)
    .bind(title)
    .bind(primary_source)
    .bind(serde_json::to_value(ThreadState::default()).expect("ThreadState always serializes"))
    .fetch_one(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Thread::try_from(row)
}

/// Fetch a thread by its internal id.
pub async fn get_thread(pool: &DbPool, id: i64) -> Result<Thread, StorageError> {
    let row: ThreadRow = sqlx::query_as(
        "SELECT id, public_id, workspace_id, title, status, primary_source, thread_state, created_at, updated_at, last_activity_at \
         FROM feedback_threads WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?
    .ok_or_else(|| StorageError::NotFound {
        entity: "thread".to_string(),
        id: id.to_string(),
    })?;

    Thread::try_from(row)
}

/// Fetch a thread by its opaque public id, used by ingress to resolve
/// the numeric id before enqueuing.
pub async fn get_thread_by_public_id(pool: &DbPool, public_id: &str) -> Result<Option<Thread>, StorageError> {
    let row: Option<ThreadRow> = sqlx::query_as(
        "SELECT id, public_id, workspace_id, title, status, primary_source, thread_state, created_at, updated_at, last_activity_at \
         FROM feedback_threads WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    row.map(Thread::try_from).transpose()
}

/// Update a thread's cumulative state, bumping `updated_at` and
/// `last_activity_at`, using optimistic concurrency on `updated_at`:
/// on conflict (the row's `updated_at` no longer matches what the
/// caller last read), the update affects zero rows and the caller
/// should reload and retry once.
///
/// Generic over the executor so the Updater can run this in the same
/// transaction as the `threadstate_updated` audit row it writes
/// alongside it — `&DbPool` and `&mut Transaction<'_, Postgres>` both
/// satisfy `PgExecutor`.
pub async fn update_thread_state<'e, E>(
    executor: E,
    id: i64,
    expected_updated_at: DateTime<Utc>,
    new_state: &ThreadState,
) -> Result<bool, StorageError>
where
    E: sqlx::PgExecutor<'e>,
{
    let now = Utc::now();
    let state_json = serde_json::to_value(new_state).map_err(|e| StorageError::Query {
        source: sqlx::Error::Encode(Box::new(e)),
    })?;

    let result = sqlx::query(
        "UPDATE feedback_threads SET thread_state = $1, updated_at = $2, last_activity_at = $2 \
         WHERE id = $3 AND updated_at = $4",
    )
    .bind(state_json)
    .bind(now)
    .bind(id)
    .bind(expected_updated_at)
    .execute(executor)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() == 1)
}

/// Transition `thread.status`, again guarded by optimistic concurrency
/// on `updated_at` so a concurrent edit is not clobbered.
pub async fn transition_status(
    pool: &DbPool,
    id: i64,
    expected_updated_at: DateTime<Utc>,
    new_status: ThreadStatus,
) -> Result<bool, StorageError> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE feedback_threads SET status = $1, updated_at = $2 WHERE id = $3 AND updated_at = $4",
    )
    .bind(new_status.as_str())
    .bind(now)
    .bind(id)
    .bind(expected_updated_at)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() == 1)
}
