// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dormbite - campus food-delivery coordination bot.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod reset;
mod serve;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dormbite_config::{ConfigError, DormbiteConfig};

/// Dormbite - campus food-delivery coordination bot.
#[derive(Parser, Debug)]
#[command(name = "dormbite", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the usual locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the bot (the default).
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
    /// Cancel every pending or accepted order without starting the bot.
    ResetOrders,
}

fn load(path: Option<&Path>) -> Result<DormbiteConfig, Vec<ConfigError>> {
    match path {
        Some(path) => dormbite_config::load_and_validate_path(path),
        None => dormbite_config::load_and_validate(),
    }
}

fn summary(config: &DormbiteConfig) -> String {
    format!(
        "dormbite: config OK (dispatch chat {}, {} restaurants, {:?} mode, database {})",
        config.dispatch.chat_id,
        config.restaurants.len(),
        config.bot.run_mode,
        config.storage.database_path
    )
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            dormbite_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::CheckConfig => {
            println!("{}", summary(&config));
            Ok(())
        }
        Commands::ResetOrders => reset::run_reset(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["dormbite"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.command.unwrap_or(Commands::Serve), Commands::Serve);
    }

    #[test]
    fn parses_subcommands_and_global_config() {
        let cli =
            Cli::try_parse_from(["dormbite", "check-config", "--config", "/tmp/d.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/d.toml")));

        let cli = Cli::try_parse_from(["dormbite", "reset-orders"]).unwrap();
        assert_eq!(cli.command, Some(Commands::ResetOrders));
    }

    #[test]
    fn invalid_config_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dormbite.toml");
        std::fs::write(
            &path,
            "[telegram]\nbot_token = \"1:abc\"\n[dispatch]\nchat_id = -1001\narrival_radius_m = 0.0\n",
        )
        .unwrap();
        let errors = load(Some(&path)).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("arrival_radius_m")));
    }

    #[test]
    fn check_config_summary_names_dispatch_chat() {
        let config = dormbite_config::load_and_validate_str(
            "[telegram]\nbot_token = \"1:abc\"\n[dispatch]\nchat_id = -1001\n",
        )
        .unwrap();
        let line = summary(&config);
        assert!(line.contains("dispatch chat -1001"));
        assert!(line.contains("Polling mode"));
    }
}
