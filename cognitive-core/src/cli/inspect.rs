//! Inspect command - summarize an exported recording

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::recording::{EventRecorder, EventRecording};

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Exported recording (JSON)
    pub file: PathBuf,

    /// List every event
    #[arg(long)]
    pub events: bool,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let recording = EventRecorder::default().import_recording(&text)?;

    print_summary(&recording);
    if args.events {
        println!();
        for event in &recording.events {
            println!(
                "{:>8} ms  {:<16} {}",
                event.relative_time_ms, event.event_type, event.payload
            );
        }
    }
    Ok(())
}

pub(crate) fn print_summary(recording: &EventRecording) {
    println!();
    println!("=== Recording ===");
    println!();
    println!("Id:        {}", recording.id);
    println!("Name:      {}", recording.name);
    println!("Started:   {}", recording.started_at.to_rfc3339());
    println!("Duration:  {} ms", recording.duration_ms);
    println!("Events:    {}", recording.event_count);
    if recording.truncated {
        println!("⚠️  Recording was truncated at its event cap");
    }

    let types = recording.event_types();
    if !types.is_empty() {
        println!();
        println!("Event types:");
        for (event_type, count) in types {
            println!("   {:<16} {}", event_type, count);
        }
    }
}
