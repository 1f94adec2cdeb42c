//! Configuration management for the feedback-intelligence pipeline service.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (path from `--config` / `FIP_CONFIG` / default)
//! 3. Environment variable overrides (flat names, matching the external
//!    interface documented for operators — see [`env_overrides`])
//!
//! CLI flag overrides (e.g. `--bind`) are applied by the binary crates
//! after loading, taking precedence over both the file and the
//! environment.

mod defaults;
mod env_overrides;
mod validation;

pub use defaults::default_toml;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the pipeline service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider connection settings.
    pub llm: LlmConfig,
    /// Worker pool sizing.
    pub worker: WorkerConfig,
    /// Message broker (queue) connection.
    pub broker: BrokerConfig,
    /// Relational store connection.
    pub database: DatabaseConfig,
    /// Mesh-aware transport settings.
    pub transport: TransportConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Ingress validation limits.
    pub ingress: IngressConfig,
    /// Work-item emission strategy.
    pub work_item: WorkItemConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            worker: WorkerConfig::default(),
            broker: BrokerConfig::default(),
            database: DatabaseConfig::default(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
            ingress: IngressConfig::default(),
            work_item: WorkItemConfig::default(),
        }
    }
}

/// LLM provider connection settings (spec: `LLM_BASE_URL`, `LLM_API_KEY`,
/// `LLM_MODEL`, `LLM_REQUEST_TIMEOUT_MS`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint root for chat completions, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Per-attempt deadline in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_ms: 120_000,
        }
    }
}

/// Worker pool sizing (spec: `WORKER_CONCURRENCY`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of parallel pipeline workers. `None` means "default to
    /// `min(8, available_parallelism)`" at startup.
    pub concurrency: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: None }
    }
}

impl WorkerConfig {
    /// Resolve the effective worker count, applying the
    /// `min(8, CPU)` default when unset.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(4)
        })
    }
}

/// Message broker connection (spec: `BROKER_URL`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Redis-streams-class broker connection string.
    pub url: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Relational store connection (spec: `DATABASE_URL`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string.
    pub url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
        }
    }
}

/// Mesh-aware transport settings (spec: `MESH_DOMAIN_SUFFIX`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Hostname suffix that triggers address-family fallback.
    pub mesh_domain_suffix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mesh_domain_suffix: ".railway.internal".to_string(),
        }
    }
}

/// Logging configuration (spec: `LOG_LEVEL`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Structured log threshold (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Ingress validation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Maximum accepted `text` length in bytes.
    pub max_text_bytes: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            max_text_bytes: 16 * 1024,
        }
    }
}

/// Which `WorkItemEmitter` implementation to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemEmitMode {
    /// Call the downstream creator in-process.
    InProcess,
    /// Publish onto a queued topic for an out-of-process consumer.
    Queued,
}

impl Default for WorkItemEmitMode {
    fn default() -> Self {
        WorkItemEmitMode::InProcess
    }
}

/// Work-item emission configuration. Both in-process and queued emitter
/// shapes must be supported.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkItemConfig {
    /// Selected emitter implementation.
    pub emit_mode: WorkItemEmitMode,
    /// Downstream work-item creation endpoint, used only when
    /// `emit_mode = in_process`.
    pub create_url: String,
}

impl Default for WorkItemConfig {
    fn default() -> Self {
        Self {
            emit_mode: WorkItemEmitMode::InProcess,
            create_url: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Loading sequence:
    /// 1. Determine config file path (argument > `FIP_CONFIG` env var > default)
    /// 2. Parse TOML file (or fall back to defaults if the default path is absent)
    /// 3. Apply environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = config_path {
            return (expand_tilde(p), true);
        }
        if let Ok(p) = std::env::var("FIP_CONFIG") {
            return (expand_tilde(&p), true);
        }
        (PathBuf::from("./fip.toml"), false)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.request_timeout_ms, 120_000);
        assert_eq!(config.ingress.max_text_bytes, 16 * 1024);
        assert_eq!(config.transport.mesh_domain_suffix, ".railway.internal");
    }

    #[test]
    fn effective_concurrency_defaults_when_unset() {
        let config = WorkerConfig::default();
        assert!(config.effective_concurrency() >= 1);
        assert!(config.effective_concurrency() <= 8);
    }

    #[test]
    fn effective_concurrency_honors_explicit_value() {
        let config = WorkerConfig {
            concurrency: Some(3),
        };
        assert_eq!(config.effective_concurrency(), 3);
    }

    #[test]
    fn load_missing_default_path_falls_back_to_defaults() {
        // No FIP_CONFIG set, default path almost certainly absent in test env.
        std::env::remove_var("FIP_CONFIG");
        let config = Config::load(None).expect("should fall back to defaults");
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn load_explicit_missing_path_errors() {
        let result = Config::load(Some("/nonexistent/path/fip.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn toml_round_trip_parses_nested_sections() {
        let toml_str = r#"
            [llm]
            base_url = "https://api.openai.com/v1"
            api_key = "sk-test"
            model = "gpt-4o-mini"
            request_timeout_ms = 60000

            [worker]
            concurrency = 4

            [broker]
            url = "redis://localhost:6379"

            [database]
            url = "postgres://localhost/fip"
        "#;
        let config: Config = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.worker.concurrency, Some(4));
        assert_eq!(config.broker.url, "redis://localhost:6379");
    }
}
