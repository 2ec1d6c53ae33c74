//! Cognitive monitor CLI
//!
//! Provides commands for:
//! - `demo`: Simulate a runtime, record it and dry-run replay it
//! - `inspect`: Summarize an exported recording
//! - `replay`: Replay an exported recording

use anyhow::Result;
use clap::Parser;

use cognitive_common::logging::{init_logging, LogConfig};
use cognitive_core::cli::{load_settings, Cli, Commands};
use cognitive_core::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LogConfig::from_env().with_app_name("cognitive-monitor"))
        .map_err(|e| anyhow::anyhow!(e))?;
    telemetry::register_metrics()?;

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo(args) => {
            cognitive_core::cli::demo::execute(args, settings).await?;
        }
        Commands::Inspect(args) => {
            cognitive_core::cli::inspect::execute(args)?;
        }
        Commands::Replay(args) => {
            cognitive_core::cli::replay::execute(args, settings).await?;
        }
    }

    Ok(())
}
