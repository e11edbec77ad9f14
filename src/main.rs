//! # Neoscribe
//!
//! Session layer for a multi-document viewer and editor. The binary drives
//! the session headlessly: scripts of host requests and collaborator events
//! are replayed and the outcome is printed as JSON.
//!
//! ## Quick Start
//!
//! ```bash
//! # Replay a script
//! cargo run -- replay session.json --pretty
//!
//! # Show the effective configuration
//! cargo run -- config
//! ```

mod replay;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neoscribe_core::SessionConfig;

/// Neoscribe - headless document session driver
#[derive(Parser, Debug)]
#[command(name = "neoscribe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON script against a headless session
    Replay {
        /// Script to replay
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Directory for scratch files written by exports
        #[arg(long, value_name = "DIR")]
        scratch_dir: Option<PathBuf>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so reports on stdout stay parseable
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Neoscribe v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => SessionConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SessionConfig::load(),
    };

    match args.command {
        Command::Replay {
            script,
            scratch_dir,
            pretty,
        } => {
            let script = replay::load_script(&script)?;
            let scratch = scratch_dir.unwrap_or_else(replay::default_scratch_dir);
            let report = replay::run(config, script, &scratch).await?;

            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", json);
        }
        Command::Config => {
            let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", text);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_replay() {
        let args = Args::parse_from(["neoscribe", "-vv", "replay", "run.json", "--pretty"]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Replay { script, pretty, scratch_dir } => {
                assert_eq!(script, PathBuf::from("run.json"));
                assert!(pretty);
                assert!(scratch_dir.is_none());
            }
            Command::Config => panic!("expected replay"),
        }
    }

    #[test]
    fn test_args_config_file() {
        let args = Args::parse_from(["neoscribe", "config", "--config", "custom.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(args.command, Command::Config));
    }
}
