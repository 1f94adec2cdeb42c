use chrono::{DateTime, Utc};

/// A turn in a thread. Created by ingress or internal-note submission;
/// editable in place; deletable (tombstone via `deleted_at`). Order
/// inside a thread is append-only: `(thread_id, created_at)` totally
/// orders the conversation, with `id` breaking ties.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: i64,
    pub public_id: String,
    pub thread_id: i64,
    pub source: MessageSource,
    pub sender_type: SenderType,
    pub sender_name: Option<String>,
    pub visibility: Visibility,
    pub text: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    Widget,
    Api,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    User,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Internal,
}

impl std::str::FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "widget" => Ok(MessageSource::Widget),
            "api" => Ok(MessageSource::Api),
            "other" => Ok(MessageSource::Other),
            other => Err(format!("unknown message source: {other}")),
        }
    }
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageSource::Widget => "widget",
            MessageSource::Api => "api",
            MessageSource::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SenderType::User),
            "internal" => Ok(SenderType::Internal),
            other => Err(format!("unknown sender type: {other}")),
        }
    }
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SenderType::User => "user",
            SenderType::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "internal" => Ok(Visibility::Internal),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Visibility::Public => "public",
            Visibility::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_source_round_trips() {
        for s in [MessageSource::Widget, MessageSource::Api, MessageSource::Other] {
            let parsed: MessageSource = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn unknown_source_errors() {
        assert!("carrier-pigeon".parse::<MessageSource>().is_err());
    }
}
