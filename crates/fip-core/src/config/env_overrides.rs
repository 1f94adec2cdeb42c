//! Environment variable overrides.
//!
//! Variable names are flat (no section prefix) and fixed by the service's
//! external interface, so operators can set them directly in a process
//! supervisor or container runtime without needing to know the TOML
//! section layout:
//!
//! - `LLM_BASE_URL`, `LLM_API_KEY`, `LLM_MODEL`, `LLM_REQUEST_TIMEOUT_MS`
//! - `WORKER_CONCURRENCY`
//! - `BROKER_URL`
//! - `DATABASE_URL`
//! - `MESH_DOMAIN_SUFFIX`
//! - `LOG_LEVEL` (falls back to `RUST_LOG` if unset, so `tracing`'s own
//!   convention still works for anyone who only knows that one)
//! - `WORK_ITEM_EMIT_MODE` (`in_process` | `queued`)
//! - `WORK_ITEM_CREATE_URL`

use super::{Config, WorkItemEmitMode};
use crate::error::ConfigError;

impl Config {
    /// Apply environment variable overrides on top of whatever was loaded
    /// from defaults/TOML. Unset variables leave the existing value alone.
    pub(super) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_string("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env_string("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = env_string("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env_u64("LLM_REQUEST_TIMEOUT_MS")? {
            self.llm.request_timeout_ms = v;
        }

        if let Some(v) = env_usize("WORKER_CONCURRENCY")? {
            self.worker.concurrency = Some(v);
        }

        if let Some(v) = env_string("BROKER_URL") {
            self.broker.url = v;
        }

        if let Some(v) = env_string("DATABASE_URL") {
            self.database.url = v;
        }

        if let Some(v) = env_string("MESH_DOMAIN_SUFFIX") {
            self.transport.mesh_domain_suffix = v;
        }

        if let Some(v) = env_string("LOG_LEVEL").or_else(|| env_string("RUST_LOG")) {
            self.logging.level = v;
        }

        if let Some(raw) = env_string("WORK_ITEM_EMIT_MODE") {
            self.work_item.emit_mode = match raw.as_str() {
                "in_process" => WorkItemEmitMode::InProcess,
                "queued" => WorkItemEmitMode::Queued,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "WORK_ITEM_EMIT_MODE".to_string(),
                        message: format!("expected 'in_process' or 'queued', got '{other}'"),
                    })
                }
            };
        }

        if let Some(v) = env_string("WORK_ITEM_CREATE_URL") {
            self.work_item.create_url = v;
        }

        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                message: format!("expected an integer, got '{raw}'"),
            }),
    }
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                message: format!("expected an integer, got '{raw}'"),
            }),
    }
}
