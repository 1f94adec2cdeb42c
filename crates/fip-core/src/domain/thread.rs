use super::ThreadState;
use chrono::{DateTime, Utc};

/// A conversation. Created when its first message arrives; mutated by
/// the Updater and the Orchestrator; never destroyed by the core
/// (soft close only, via [`ThreadStatus::Closed`]).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Thread {
    pub id: i64,
    pub public_id: String,
    pub workspace_id: String,
    pub title: String,
    pub status: ThreadStatus,
    pub primary_source: String,
    pub thread_state: ThreadState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Thread {
    /// `lastActivityAt >= max(createdAt, latest message createdAt)` is
    /// the core's stated invariant; this checks it against a candidate
    /// message timestamp so callers can assert it at the write site.
    pub fn last_activity_covers(&self, message_created_at: DateTime<Utc>) -> bool {
        self.last_activity_at >= self.created_at && self.last_activity_at >= message_created_at
    }
}

/// `Thread.status` state machine:
/// `Open` —AskQuestions→ `WaitingOnUser` —new user message→ `Open`;
/// either —operator action→ `Resolved`/`Closed`; `Resolved` —reopen→ `Open`;
/// `Closed` is terminal w.r.t. core processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Open,
    WaitingOnUser,
    Resolved,
    Closed,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStatus::Open => "open",
            ThreadStatus::WaitingOnUser => "waiting_on_user",
            ThreadStatus::Resolved => "resolved",
            ThreadStatus::Closed => "closed",
        }
    }

    /// The Orchestrator skips closed threads: dequeues and audits, but
    /// never invokes the Updater/Gatekeeper for them.
    pub fn is_terminal_for_processing(self) -> bool {
        matches!(self, ThreadStatus::Closed)
    }
}

impl std::str::FromStr for ThreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ThreadStatus::Open),
            "waiting_on_user" => Ok(ThreadStatus::WaitingOnUser),
            "resolved" => Ok(ThreadStatus::Resolved),
            "closed" => Ok(ThreadStatus::Closed),
            other => Err(format!("unknown thread status: {other}")),
        }
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ThreadStatus::Open,
            ThreadStatus::WaitingOnUser,
            ThreadStatus::Resolved,
            ThreadStatus::Closed,
        ] {
            let parsed: ThreadStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn only_closed_is_terminal() {
        assert!(ThreadStatus::Closed.is_terminal_for_processing());
        assert!(!ThreadStatus::Open.is_terminal_for_processing());
        assert!(!ThreadStatus::WaitingOnUser.is_terminal_for_processing());
        assert!(!ThreadStatus::Resolved.is_terminal_for_processing());
    }
}
