//! Implementation of the `fip config` subcommands.

use fip_core::config::Config;

use super::ConfigCommands;

pub async fn execute(config_path: Option<&str>, sub: ConfigCommands) -> anyhow::Result<()> {
    match sub {
        ConfigCommands::Check => check(config_path),
        ConfigCommands::Init => {
            print!("{}", fip_core::config::default_toml());
            Ok(())
        }
    }
}

fn check(config_path: Option<&str>) -> anyhow::Result<()> {
    match Config::load_and_validate(config_path) {
        Ok(_) => {
            println!("configuration is valid");
            Ok(())
        }
        Err(errors) => {
            eprintln!("configuration is invalid:");
            for err in &errors {
                eprintln!("  - {err}");
            }
            anyhow::bail!("{} error(s) found", errors.len());
        }
    }
}
