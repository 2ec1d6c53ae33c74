//! Command-line interface
//!
//! Provides the `cognitive-monitor` commands.

pub mod demo;
pub mod inspect;
pub mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;

use crate::config::Settings;

/// Cognitive observability monitor
#[derive(Parser)]
#[command(name = "cognitive-monitor")]
#[command(about = "Metrics, alerting and event replay for cognitive runtimes")]
#[command(version)]
pub struct Cli {
    /// Settings file; defaults to the layered config/ directory and environment
    #[arg(long, short, global = true, env = "COGNITIVE_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Drive a synthetic runtime, then record and replay it
    Demo(demo::DemoArgs),
    /// Print the summary of an exported recording
    Inspect(inspect::InspectArgs),
    /// Replay an exported recording into the log
    Replay(replay::ReplayArgs),
}

/// Load settings from `path`, or from the layered defaults when absent
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(p) => Settings::from_file(p)
            .with_context(|| format!("failed to load settings from {}", p.display()))?,
        None => Settings::load().context("failed to load settings")?,
    };
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay_args() {
        let cli = Cli::parse_from([
            "cognitive-monitor",
            "replay",
            "session.json",
            "--speed",
            "3",
            "--dry-run",
        ]);

        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.file.to_str(), Some("session.json"));
                assert_eq!(args.speed, Some(3.0));
                assert!(args.dry_run);
            }
            _ => panic!("expected replay command"),
        }
    }
}
