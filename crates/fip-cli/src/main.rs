//! `fip` operator CLI.
//!
//! Entry point for the `fip` binary. Parses CLI arguments, initializes
//! logging, and dispatches to subcommand handlers. Each subcommand is a
//! thin wrapper over `fip-core` (and, for `run`, `fip-server`) — this
//! binary owns no business logic of its own.
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Operator CLI for the feedback-intelligence pipeline service.
#[derive(Parser)]
#[command(name = "fip")]
#[command(version)]
#[command(about = "Operator CLI for the feedback-intelligence pipeline service")]
#[command(after_help = "\
Quick start:
  1. fip config init   — write a starter fip.toml
  2. fip migrate        — apply database migrations
  3. fip healthcheck    — verify Postgres/Redis/LLM connectivity
  4. fip run            — start the server and pipeline workers")]
struct Cli {
    /// Path to fip.toml
    #[arg(short = 'c', long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the HTTP server and pipeline workers
    Run(commands::RunArgs),
    /// Apply database migrations
    Migrate(commands::MigrateArgs),
    /// Inspect and validate configuration
    #[command(subcommand)]
    Config(commands::ConfigCommands),
    /// Submit a single message through the ingress path, bypassing HTTP
    Ingest(commands::IngestArgs),
    /// Verify Postgres, Redis, and LLM connectivity
    Healthcheck(commands::HealthcheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() || std::env::var("LOG_LEVEL").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("fip=debug,fip_core=debug,info")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("fip=info,fip_core=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .compact()
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(cli.config.as_deref(), args).await,
        Commands::Migrate(_args) => commands::migrate::execute(cli.config.as_deref()).await,
        Commands::Config(sub) => commands::config_check::execute(cli.config.as_deref(), sub).await,
        Commands::Ingest(args) => commands::ingest::execute(cli.config.as_deref(), args).await,
        Commands::Healthcheck(_args) => commands::healthcheck::execute(cli.config.as_deref()).await,
    }
}
