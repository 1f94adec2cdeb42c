//! Postgres storage layer.
//!
//! Provides database initialization, connection pooling, and CRUD
//! operations for the three tables the service owns: `feedback_threads`,
//! `feedback_messages`, `audit_logs`. Each table maps to a plain struct
//! via `sqlx::FromRow`, with typed query functions returning
//! `StorageError` rather than leaking `sqlx::Error` past this module.

pub mod audit;
pub mod messages;
pub mod threads;

use crate::error::StorageError;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Type alias for the Postgres connection pool.
pub type DbPool = sqlx::PgPool;

/// Initialize the Postgres connection pool and run embedded migrations.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<DbPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StorageError::Migration { source: e })?;

    Ok(pool)
}

/// Initialize a pool for tests, against a database already provisioned
/// by the test harness (e.g. via `testcontainers` or a CI Postgres
/// service). Migrations still run so each test suite starts from a
/// known schema.
#[cfg(any(test, feature = "test-helpers"))]
pub async fn init_test_db(database_url: &str) -> Result<DbPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StorageError::Migration { source: e })?;

    Ok(pool)
}

/// A lightweight connectivity probe for readiness checks: does not run
/// migrations or hold a dedicated connection beyond `SELECT 1`.
pub async fn ping(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
