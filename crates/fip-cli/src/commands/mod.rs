//! CLI subcommand argument definitions. Each struct's flags match the
//! corresponding module's `execute` function signature.

pub mod config_check;
pub mod healthcheck;
pub mod ingest;
pub mod migrate;
pub mod run;

use clap::Args;

/// Arguments for the `run` subcommand.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,
}

/// Arguments for the `migrate` subcommand.
#[derive(Debug, Args)]
pub struct MigrateArgs;

/// `fip config` subcommands.
#[derive(Debug, clap::Subcommand)]
pub enum ConfigCommands {
    /// Load and validate configuration, reporting every problem found.
    Check,
    /// Print the built-in default configuration as TOML.
    Init,
}

/// Arguments for the `ingest` subcommand.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Thread's external identifier (e.g. the support-ticket ID).
    #[arg(long)]
    pub thread_public_id: String,

    /// Message's external identifier, used for idempotent ingestion.
    #[arg(long)]
    pub message_public_id: String,

    /// Message body.
    #[arg(long)]
    pub text: String,

    /// Who sent the message: `user` or `agent`.
    #[arg(long, default_value = "user")]
    pub sender_type: String,

    /// Display name of the sender, if known.
    #[arg(long)]
    pub sender_name: Option<String>,

    /// `public` or `internal`.
    #[arg(long, default_value = "public")]
    pub visibility: String,
}

/// Arguments for the `healthcheck` subcommand.
#[derive(Debug, Args)]
pub struct HealthcheckArgs;
