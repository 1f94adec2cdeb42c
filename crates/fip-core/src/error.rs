//! Error types for the feedback-intelligence pipeline core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors. Network-class
//! failures are always represented as a distinct enum variant, never
//! recovered from a formatted message string, so that business logic can
//! match on error *kind* rather than text.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Transport-level failures talking to the LLM endpoint.
///
/// Kept as a dedicated enum (rather than folded into [`LlmError`]) so the
/// mesh-aware transport and the plain `reqwest` fallback path can both
/// produce the same classification regardless of which one handled the
/// request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Name resolution failed. Carries the per-family diagnostic collected
    /// when the mesh-domain fallback path gave up.
    #[error("DNS resolution failed for {host}: {diagnostic}")]
    Dns {
        /// The host that failed to resolve.
        host: String,
        /// Human-readable summary of what each address family returned.
        diagnostic: String,
    },

    /// The request exceeded its deadline.
    #[error("request to {host} timed out after {elapsed_ms}ms")]
    Timeout {
        /// The host being contacted.
        host: String,
        /// Milliseconds elapsed before the deadline fired.
        elapsed_ms: u64,
    },

    /// TCP/TLS connection establishment failed.
    #[error("failed to connect to {host}: {message}")]
    Connect {
        /// The host being contacted.
        host: String,
        /// Details from the underlying connector.
        message: String,
    },

    /// The peer responded but violated the expected HTTP/TLS protocol.
    #[error("protocol error talking to {host}: {message}")]
    Protocol {
        /// The host being contacted.
        host: String,
        /// Details about the violation.
        message: String,
    },

    /// The external cancellation signal fired before the request completed.
    #[error("request to {host} was cancelled")]
    Cancelled {
        /// The host being contacted.
        host: String,
    },
}

/// Errors from interacting with LLM providers over the OpenAI-compatible
/// chat-completions wire format.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Every retry attempt was exhausted, the circuit breaker is open, or
    /// the server returned a non-retryable status. The Updater surfaces
    /// this upward so the orchestrator re-enqueues instead of persisting
    /// stale state.
    #[error("LLM unavailable: {reason}")]
    Unavailable {
        /// Human-readable explanation (exhausted retries, open circuit, ...).
        reason: String,
    },

    /// Transport-level failure on a single attempt. Distinct from
    /// `Unavailable`, which is raised only after the retry/circuit policy
    /// gives up.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// LLM API returned a non-retryable error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// LLM provider rate limit hit on a single attempt (retried by the caller).
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The assistant's reply could not be turned into valid, schema-conformant
    /// JSON even after repair and one corrective retry.
    #[error("malformed LLM response: {reason}")]
    Malformed {
        /// Why validation failed.
        reason: String,
        /// The raw content that failed to validate, if captured.
        raw_content: Option<String>,
    },

    /// No LLM provider configured.
    #[error("no LLM provider configured")]
    NotConfigured,
}

impl LlmError {
    /// Whether this error represents the network-or-circuit class of
    /// failure the Updater must treat as "retry the job", as opposed to a
    /// malformed-response class the Updater treats as "keep prior state".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LlmError::Unavailable { .. } | LlmError::Transport(_))
    }
}

/// Errors from the Postgres storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// An optimistic-concurrency compare-and-set lost the race.
    #[error("conflicting concurrent update for {entity} {id}")]
    Conflict {
        /// The entity type that conflicted (e.g. "thread").
        entity: String,
        /// The entity's id.
        id: i64,
    },

    /// The referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// The entity type (e.g. "thread").
        entity: String,
        /// The entity's id or public id.
        id: String,
    },
}

/// Errors from the durable job queue (broker) layer.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The broker connection failed or was lost mid-operation.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Enqueue/dequeue/ack operation failed against an otherwise-healthy broker.
    #[error("broker operation failed: {0}")]
    Operation(String),

    /// A job payload could not be (de)serialized.
    #[error("job payload error: {0}")]
    Payload(String),
}

/// Errors surfaced by the pipeline orchestrator while sequencing a job
/// through Updater → Gatekeeper → Work-Item emit → status transition.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The Updater could not reach the LLM; the orchestrator should
    /// re-enqueue per the attempt/backoff policy rather than advance.
    #[error("LLM unavailable while updating thread {thread_id}")]
    LlmUnavailable {
        /// The thread being processed.
        thread_id: i64,
    },

    /// Storage failed in a way that is not a recoverable optimistic-lock conflict.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The queue/broker failed while (re)enqueuing or acknowledging a job.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Downstream work-item creation failed. Audited but non-fatal to the
    /// pipeline; the state transition already committed.
    #[error("work item emit failed: {0}")]
    Emit(#[from] EmitError),

    /// The job exceeded its attempt ceiling and was dead-lettered.
    #[error("thread {thread_id} dead-lettered after {attempts} attempts")]
    DeadLettered {
        /// The thread the job was processing.
        thread_id: i64,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Errors rejecting an ingress submission before it reaches the queue.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// The field name.
        field: String,
    },

    /// `text` exceeded the configured size cap.
    #[error("message text exceeds {limit} bytes (got {actual})")]
    TextTooLarge {
        /// The configured cap.
        limit: usize,
        /// The actual payload size.
        actual: usize,
    },

    /// An enumerated field held a value outside its valid set.
    #[error("invalid value for '{field}': {value}")]
    InvalidEnum {
        /// The field name.
        field: String,
        /// The offending value.
        value: String,
    },
}

/// Errors surfaced by the ingress adapter while accepting a new message.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    /// The submission failed validation before anything was written.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage failed while resolving the thread or writing the message.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The broker failed while enqueuing the pipeline job. The message
    /// row is already committed at this point; the caller should not
    /// retry the HTTP request (that would violate `messagePublicId`
    /// idempotency) but the job itself is lost and needs manual replay.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Errors from the downstream work-item creation interface.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The downstream call failed at the transport level.
    #[error("work item emitter transport error: {0}")]
    Transport(String),

    /// The downstream service rejected the request.
    #[error("work item emitter rejected request (status {status}): {message}")]
    Rejected {
        /// The HTTP-equivalent status, if applicable.
        status: u16,
        /// Details from the downstream service.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField {
            field: "llm.base_url".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required config field: llm.base_url"
        );
    }

    #[test]
    fn config_error_invalid_value_message() {
        let err = ConfigError::InvalidValue {
            field: "worker_concurrency".to_string(),
            message: "must be >= 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for config field 'worker_concurrency': must be >= 1"
        );
    }

    #[test]
    fn config_error_file_not_found_message() {
        let err = ConfigError::FileNotFound {
            path: "/etc/fip/config.toml".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "config file not found: /etc/fip/config.toml"
        );
    }

    #[test]
    fn transport_error_dns_message() {
        let err = TransportError::Dns {
            host: "llm.railway.internal".to_string(),
            diagnostic: "ipv4=not-found ipv6=not-found default=not-found".to_string(),
        };
        assert!(err.to_string().contains("llm.railway.internal"));
    }

    #[test]
    fn llm_error_unavailable_is_unavailable() {
        let err = LlmError::Unavailable {
            reason: "circuit open".to_string(),
        };
        assert!(err.is_unavailable());
    }

    #[test]
    fn llm_error_transport_is_unavailable() {
        let err = LlmError::Transport(TransportError::Connect {
            host: "api.openai.com".to_string(),
            message: "refused".to_string(),
        });
        assert!(err.is_unavailable());
    }

    #[test]
    fn llm_error_malformed_is_not_unavailable() {
        let err = LlmError::Malformed {
            reason: "missing field recommendation".to_string(),
            raw_content: None,
        };
        assert!(!err.is_unavailable());
    }

    #[test]
    fn llm_error_rate_limited_message() {
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(err.to_string(), "LLM rate limited, retry after 30 seconds");
    }

    #[test]
    fn llm_error_api_error_message() {
        let err = LlmError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "LLM API error (status 401): invalid api key"
        );
    }

    #[test]
    fn storage_error_conflict_message() {
        let err = StorageError::Conflict {
            entity: "thread".to_string(),
            id: 42,
        };
        assert_eq!(err.to_string(), "conflicting concurrent update for thread 42");
    }

    #[test]
    fn validation_error_text_too_large_message() {
        let err = ValidationError::TextTooLarge {
            limit: 16384,
            actual: 20000,
        };
        assert_eq!(
            err.to_string(),
            "message text exceeds 16384 bytes (got 20000)"
        );
    }

    #[test]
    fn pipeline_error_dead_lettered_message() {
        let err = PipelineError::DeadLettered {
            thread_id: 7,
            attempts: 6,
        };
        assert_eq!(err.to_string(), "thread 7 dead-lettered after 6 attempts");
    }
}
