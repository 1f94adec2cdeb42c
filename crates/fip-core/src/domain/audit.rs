use chrono::{DateTime, Utc};

/// Append-only record for a state-changing operation. Written by the
/// Updater, the Orchestrator, and Gatekeeper-failure paths; never
/// mutated.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
