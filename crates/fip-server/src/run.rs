//! Startup sequence shared by the `fip-server` binary and `fip run` in
//! `fip-cli`: load config, connect dependencies, spawn pipeline workers,
//! serve HTTP, wait for shutdown.
//!
//! Follows the usual config → storage → provider → state → router →
//! bind → serve sequencing, extended with the worker-pool spawn this
//! service adds and the `Runtime::shutdown`/`wait_for_shutdown_signal`
//! pair for graceful exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fip_core::automation::{wait_for_shutdown_signal, Runtime};
use fip_core::config::{Config, WorkItemEmitMode};
use fip_core::llm::openai_compat::OpenAiCompatProvider;
use fip_core::llm::RetryingLlmClient;
use fip_core::pipeline::emitter::{InProcessEmitter, QueuedEmitter};
use fip_core::pipeline::{Orchestrator, PerThreadLeases, WorkItemEmitter};
use fip_core::queue::{Broker, RedisBroker};
use fip_core::storage;
use fip_core::transport::default_transport;

use crate::state::AppState;
use crate::worker::{run_delay_promoter, run_pipeline_worker};

/// Process exit codes.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const BAD_CONFIG: i32 = 2;
    pub const DEPENDENCY_UNREACHABLE: i32 = 3;
}

const STARTUP_GRACE_ATTEMPTS: u32 = 5;
const STARTUP_GRACE_DELAY: Duration = Duration::from_secs(2);

/// Load and validate configuration, exiting with code 2 on failure.
/// Split out so `fip config check` (in `fip-cli`) can reuse the exact
/// same validation path without starting the server.
pub fn load_config(config_path: Option<&str>) -> Result<Config, i32> {
    match Config::load_and_validate(config_path) {
        Ok(config) => Ok(config),
        Err(errors) => {
            for err in &errors {
                tracing::error!(error = %err, "invalid configuration");
            }
            Err(exit_code::BAD_CONFIG)
        }
    }
}

/// Connect to Postgres and Redis, retrying with a fixed delay for a
/// bounded grace period before giving up with exit code 3.
async fn connect_dependencies(
    config: &Config,
) -> Result<(storage::DbPool, Arc<dyn Broker>), i32> {
    let mut last_db_err = None;
    let mut pool = None;
    for attempt in 1..=STARTUP_GRACE_ATTEMPTS {
        match storage::init_db(&config.database.url, config.database.max_connections).await {
            Ok(p) => {
                pool = Some(p);
                break;
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "database not reachable yet");
                last_db_err = Some(e);
                tokio::time::sleep(STARTUP_GRACE_DELAY).await;
            }
        }
    }
    let pool = match pool {
        Some(p) => p,
        None => {
            tracing::error!(error = ?last_db_err, "database unreachable after grace period");
            return Err(exit_code::DEPENDENCY_UNREACHABLE);
        }
    };

    let broker: Arc<dyn Broker> = match RedisBroker::connect(&config.broker.url) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            tracing::error!(error = %e, "broker unreachable");
            return Err(exit_code::DEPENDENCY_UNREACHABLE);
        }
    };

    Ok((pool, broker))
}

fn build_emitter(config: &Config, broker: Arc<dyn Broker>) -> Arc<dyn WorkItemEmitter> {
    match config.work_item.emit_mode {
        WorkItemEmitMode::InProcess => {
            let transport = Arc::new(default_transport(config.transport.mesh_domain_suffix.clone()));
            Arc::new(InProcessEmitter::new(transport, config.work_item.create_url.clone()))
        }
        WorkItemEmitMode::Queued => Arc::new(QueuedEmitter::new(broker)),
    }
}

/// Run the server: bind HTTP, spawn pipeline workers, block until
/// shutdown. Returns the process exit code the caller should use.
pub async fn run(config_path: Option<&str>, bind_addr: &str) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let (pool, broker) = match connect_dependencies(&config).await {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let transport = Arc::new(default_transport(config.transport.mesh_domain_suffix.clone()));
    let provider = Arc::new(OpenAiCompatProvider::new(
        transport,
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        "configured".to_string(),
        Duration::from_millis(config.llm.request_timeout_ms),
    ));
    let llm = Arc::new(RetryingLlmClient::new(provider));

    let emitter = build_emitter(&config, broker.clone());
    let leases = Arc::new(PerThreadLeases::new());
    let orchestrator = Arc::new(Orchestrator::new(
        pool.clone(),
        llm.clone(),
        broker.clone(),
        emitter,
        leases,
    ));

    let mut runtime = Runtime::new();
    let cancel = runtime.cancel_token();

    for worker_id in 0..config.worker.effective_concurrency() {
        let broker = broker.clone();
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        runtime.spawn(format!("pipeline-worker-{worker_id}"), async move {
            run_pipeline_worker(worker_id, broker, orchestrator, cancel).await;
        });
    }
    {
        let broker = broker.clone();
        let cancel = cancel.clone();
        runtime.spawn("delay-promoter", async move {
            run_delay_promoter(broker, cancel).await;
        });
    }

    let state = Arc::new(AppState {
        db: pool,
        broker,
        llm,
        config,
        started_at: Instant::now(),
    });
    let router = crate::build_router(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, bind_addr, "failed to bind HTTP listener");
            return exit_code::DEPENDENCY_UNREACHABLE;
        }
    };
    tracing::info!(bind_addr, "listening");

    let serve_cancel = cancel.clone();
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        serve_cancel.cancelled().await;
    });

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        () = wait_for_shutdown_signal() => {}
    }

    runtime.shutdown().await;
    exit_code::OK
}
