//! Implementation of the `fip run` command.
//!
//! Delegates to `fip_server::run::run`, the exact same startup sequence
//! the standalone `fip-server` binary uses, so the two entry points can
//! never drift.

use super::RunArgs;

pub async fn execute(config_path: Option<&str>, args: RunArgs) -> anyhow::Result<()> {
    let code = fip_server::run::run(config_path, &args.bind).await;
    std::process::exit(code);
}
