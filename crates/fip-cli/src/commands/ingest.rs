//! Implementation of the `fip ingest` command: submits one message
//! through the same `fip_core::ingress::submit` path the HTTP server's
//! `POST /ingest/message` handler calls, useful for smoke-testing a
//! deployment without standing up a separate HTTP client.

use fip_core::config::Config;
use fip_core::domain::{MessageSource, SenderType, Visibility};
use fip_core::ingress::{self, IngestOutcome, IngestRequest};
use fip_core::queue::RedisBroker;
use fip_core::storage;

use super::IngestArgs;

pub async fn execute(config_path: Option<&str>, args: IngestArgs) -> anyhow::Result<()> {
    let config = Config::load_and_validate(config_path).map_err(|errors| {
        anyhow::anyhow!(
            "invalid configuration:\n  {}",
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n  ")
        )
    })?;

    let sender_type: SenderType = args
        .sender_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let visibility: Visibility = args
        .visibility
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let pool = storage::init_db(&config.database.url, config.database.max_connections).await?;
    let broker = RedisBroker::connect(&config.broker.url)?;

    let req = IngestRequest {
        thread_public_id: args.thread_public_id,
        message_public_id: args.message_public_id,
        text: args.text,
        sender_type,
        sender_name: args.sender_name,
        visibility,
        metadata: None,
        source: MessageSource::Other,
    };

    match ingress::submit(&pool, &broker, &config.ingress, req).await? {
        IngestOutcome::Accepted { thread_id } => {
            println!("accepted, thread_id={thread_id}");
        }
        IngestOutcome::Duplicate => {
            println!("duplicate: message_public_id already processed");
        }
    }

    Ok(())
}
