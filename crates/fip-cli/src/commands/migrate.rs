//! Implementation of the `fip migrate` command.
//!
//! Applies the embedded `sqlx` migrations against the configured
//! database, the same migration run `fip_core::storage::init_db`
//! performs at server startup, but standalone so operators can run it
//! ahead of a deploy without starting the service.

use fip_core::config::Config;
use fip_core::storage;

pub async fn execute(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load_and_validate(config_path).map_err(|errors| {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n  ");
        anyhow::anyhow!("invalid configuration:\n  {joined}")
    })?;

    tracing::info!("applying migrations");
    storage::init_db(&config.database.url, config.database.max_connections).await?;
    println!("migrations applied");
    Ok(())
}
