//! `fip-server`: HTTP API + background worker process for the
//! feedback-intelligence pipeline service.
//!
//! Thin CLI wrapper around [`fip_server::run::run`] — the `fip run`
//! subcommand in `fip-cli` calls the exact same function, so the two
//! binaries can never drift on startup sequencing.

use clap::Parser;

#[derive(Parser)]
#[command(name = "fip-server", version, about = "Feedback-intelligence pipeline server")]
struct Cli {
    /// Path to a TOML config file. Falls back to `FIP_CONFIG` env var,
    /// then `./fip.toml`, then built-in defaults.
    #[arg(long)]
    config: Option<String>,

    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,
}

fn init_tracing() {
    let filter = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let code = fip_server::run::run(cli.config.as_deref(), &cli.bind).await;
    std::process::exit(code);
}
