//! Replay command - play an exported recording into the log

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::signal;
use tracing::warn;

use super::inspect::print_summary;
use crate::config::Settings;
use crate::observability::Observability;

/// Arguments for the replay command
#[derive(Args)]
pub struct ReplayArgs {
    /// Exported recording (JSON)
    pub file: PathBuf,

    /// Playback speed; defaults to replay.default_speed
    #[arg(long)]
    pub speed: Option<f64>,

    /// Walk the events without emitting them
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the replay command
pub async fn execute(args: ReplayArgs, settings: Settings) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let obs = Observability::new(settings)?;
    let recording = obs.recorder().import_recording(&text)?;
    print_summary(&recording);

    // Ctrl-C aborts the replay instead of killing the process
    let replayer = obs.replayer().clone();
    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, aborting replay");
            replayer.abort();
        }
    });

    let mut options = obs.replay_options().dry_run(args.dry_run);
    if let Some(speed) = args.speed {
        options = options.with_speed(speed);
    }
    let result = obs.replay_recording(&recording.id, options).await;
    interrupt.abort();
    let report = result?;

    println!();
    println!("=== Replay ===");
    println!();
    println!("Status:   {}", report.status);
    println!("Played:   {} / {}", report.played, report.total);
    println!("Skipped:  {}", report.skipped);
    println!("Elapsed:  {} ms", report.elapsed.as_millis());
    Ok(())
}
