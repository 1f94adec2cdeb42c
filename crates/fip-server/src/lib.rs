//! Feedback-intelligence pipeline HTTP API server.
//!
//! Exposes three routes: `GET /health`, `GET /ready`,
//! `POST /ingest/message`. Deliberately has no auth layer — these are
//! infrastructure-facing probes and the single inbound write path for
//! the system of record, not an operator-facing surface (see DESIGN.md).

pub mod error;
pub mod routes;
pub mod run;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::ready::ready))
        .route("/ingest/message", post(routes::ingest::ingest_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use fip_core::config::Config;
    use fip_core::llm::RetryingLlmClient;
    use fip_core::storage::init_test_db;
    use std::sync::Arc;
    use std::time::Instant;
    use tower::ServiceExt;

    struct NoopProvider;

    #[async_trait::async_trait]
    impl fip_core::llm::LlmProvider for NoopProvider {
        fn name(&self) -> &str {
            "noop"
        }
        async fn complete(
            &self,
            _system: &str,
            _user_message: &str,
            _params: &fip_core::llm::GenerationParams,
            _cancel: tokio_util::sync::CancellationToken,
        ) -> Result<fip_core::llm::LlmResponse, fip_core::error::LlmError> {
            Err(fip_core::error::LlmError::NotConfigured)
        }
        async fn list_models(
            &self,
            _cancel: tokio_util::sync::CancellationToken,
        ) -> Result<(), fip_core::error::LlmError> {
            Err(fip_core::error::LlmError::NotConfigured)
        }
        async fn list_tags(
            &self,
            _cancel: tokio_util::sync::CancellationToken,
        ) -> Result<(), fip_core::error::LlmError> {
            Err(fip_core::error::LlmError::NotConfigured)
        }
    }

    struct UnavailableBroker;

    #[async_trait::async_trait]
    impl fip_core::queue::Broker for UnavailableBroker {
        async fn enqueue_ingest(
            &self,
            _job: fip_core::queue::IngestMessageJob,
        ) -> Result<(), fip_core::error::QueueError> {
            Err(fip_core::error::QueueError::Connection("unavailable in test".into()))
        }
        async fn dequeue_ingest(
            &self,
        ) -> Result<Option<fip_core::queue::IngestMessageJob>, fip_core::error::QueueError> {
            Ok(None)
        }
        async fn ack_ingest(
            &self,
            _job: &fip_core::queue::IngestMessageJob,
        ) -> Result<(), fip_core::error::QueueError> {
            Ok(())
        }
        async fn requeue_ingest_delayed(
            &self,
            _job: &fip_core::queue::IngestMessageJob,
            _delay: std::time::Duration,
        ) -> Result<(), fip_core::error::QueueError> {
            Ok(())
        }
        async fn dead_letter_ingest(
            &self,
            _job: &fip_core::queue::IngestMessageJob,
            _reason: &str,
        ) -> Result<(), fip_core::error::QueueError> {
            Ok(())
        }
        async fn promote_due_ingest(&self) -> Result<usize, fip_core::error::QueueError> {
            Ok(0)
        }
        async fn enqueue_work_item(
            &self,
            _job: fip_core::queue::WorkItemCreateJob,
        ) -> Result<(), fip_core::error::QueueError> {
            Ok(())
        }
        async fn dequeue_work_item(
            &self,
        ) -> Result<Option<fip_core::queue::WorkItemCreateJob>, fip_core::error::QueueError> {
            Ok(None)
        }
        async fn ack_work_item(
            &self,
            _job: &fip_core::queue::WorkItemCreateJob,
        ) -> Result<(), fip_core::error::QueueError> {
            Ok(())
        }
        async fn queue_stats(&self) -> Result<fip_core::queue::QueueStats, fip_core::error::QueueError> {
            Err(fip_core::error::QueueError::Connection("unavailable in test".into()))
        }
    }

    async fn test_state(database_url: &str) -> Arc<AppState> {
        let db = init_test_db(database_url).await.expect("test db");
        Arc::new(AppState {
            db,
            broker: Arc::new(UnavailableBroker),
            llm: Arc::new(RetryingLlmClient::new(Arc::new(NoopProvider))),
            config: Config::default(),
            started_at: Instant::now(),
        })
    }

    #[tokio::test]
    #[ignore = "requires a Postgres test database; set FIP_TEST_DATABASE_URL to run"]
    async fn health_always_returns_200() {
        let database_url = std::env::var("FIP_TEST_DATABASE_URL").unwrap();
        let state = test_state(&database_url).await;
        let router = build_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    #[ignore = "requires a Postgres test database; set FIP_TEST_DATABASE_URL to run"]
    async fn ready_reports_503_when_broker_unavailable() {
        let database_url = std::env::var("FIP_TEST_DATABASE_URL").unwrap();
        let state = test_state(&database_url).await;
        let router = build_router(state);

        let response = router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
