//! Post-load validation.
//!
//! Unlike [`super::env_overrides`], which fails fast on the first bad
//! variable, validation collects every problem it finds so an operator
//! fixing a broken config doesn't have to run the binary once per field.

use super::{Config, WorkItemEmitMode};
use crate::error::ConfigError;

impl Config {
    /// Validate the fully-loaded configuration, returning every problem
    /// found rather than stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.llm.base_url.trim().is_empty() {
            errors.push(ConfigError::MissingField {
                field: "llm.base_url".to_string(),
            });
        }
        if self.llm.model.trim().is_empty() {
            errors.push(ConfigError::MissingField {
                field: "llm.model".to_string(),
            });
        }
        if self.llm.request_timeout_ms == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "llm.request_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if let Some(concurrency) = self.worker.concurrency {
            if concurrency == 0 {
                errors.push(ConfigError::InvalidValue {
                    field: "worker.concurrency".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }

        if self.broker.url.trim().is_empty() {
            errors.push(ConfigError::MissingField {
                field: "broker.url".to_string(),
            });
        }

        if self.database.url.trim().is_empty() {
            errors.push(ConfigError::MissingField {
                field: "database.url".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.ingress.max_text_bytes == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "ingress.max_text_bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.work_item.emit_mode == WorkItemEmitMode::InProcess
            && self.work_item.create_url.trim().is_empty()
        {
            errors.push(ConfigError::MissingField {
                field: "work_item.create_url".to_string(),
            });
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => errors.push(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                message: format!(
                    "expected one of trace|debug|info|warn|error, got '{other}'"
                ),
            }),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
