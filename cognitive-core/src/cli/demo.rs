//! Demo command - synthetic runtime exercising every component

use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::alerting::names;
use crate::config::Settings;
use crate::observability::Observability;
use crate::telemetry;

const EVENT_TYPES: [&str; 4] = ["perception", "thought", "action", "reflection"];

/// Arguments for the demo command
#[derive(Args)]
pub struct DemoArgs {
    /// Number of runtime events to simulate
    #[arg(long, default_value_t = 120)]
    pub events: usize,

    /// Replay speed for the recorded session
    #[arg(long, default_value_t = 10.0)]
    pub speed: f64,

    /// Milliseconds between simulated events
    #[arg(long, default_value_t = 5)]
    pub step_ms: u64,
}

/// Execute the demo command
pub async fn execute(args: DemoArgs, settings: Settings) -> Result<()> {
    let obs = Observability::new(settings)?;
    let metrics = obs.metrics().clone();
    let recorder = obs.recorder().clone();

    let recording_id = recorder.start_recording(Some("demo session"))?;
    info!(recording = %recording_id, events = args.events, "Simulating runtime");

    for i in 0..args.events {
        let event_type = EVENT_TYPES[i % EVENT_TYPES.len()];
        // Latency drifts upward over the run
        let latency = 50.0 + (i as f64 * 17.0) % 400.0 + (i as f64 * 12.0);

        metrics.observe(names::STEP_LATENCY_MS, latency, None)?;
        metrics.set_gauge(names::QUEUE_DEPTH, ((i * 7) % 130) as f64, None)?;
        metrics.set_gauge(names::ACTIVE_AGENTS, (1 + i % 3) as f64, None)?;
        metrics.set_gauge(
            names::MEMORY_UTILIZATION,
            (i as f64 / args.events.max(1) as f64).min(0.99),
            None,
        )?;
        if i % 9 == 0 {
            metrics.increment(names::ERRORS, 1.0, None)?;
        }

        let payload = json!({ "step": i, "type": event_type, "latencyMs": latency });
        recorder.capture(event_type, payload.to_string());

        if i % 20 == 19 {
            obs.alerts().evaluate_now();
        }
        tokio::time::sleep(Duration::from_millis(args.step_ms)).await;
    }
    obs.alerts().evaluate_now();

    let recording = recorder.stop_recording()?;

    println!();
    println!("=== Recording ===");
    println!();
    println!("Id:        {}", recording.id);
    println!("Events:    {}", recording.event_count);
    println!("Duration:  {} ms", recording.duration_ms);
    println!("Truncated: {}", recording.truncated);

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_hook = seen.clone();
    let options = obs
        .replay_options()
        .with_speed(args.speed)
        .dry_run(true)
        .with_before_event(move |_| {
            seen_hook.fetch_add(1, Ordering::Relaxed);
            true
        });
    let report = obs.replay_recording(&recording.id, options).await?;

    println!();
    println!("=== Dry-run Replay (x{}) ===", args.speed);
    println!();
    println!("Status:    {}", report.status);
    println!("Walked:    {} / {}", seen.load(Ordering::Relaxed), report.total);
    println!("Elapsed:   {} ms", report.elapsed.as_millis());

    let stats = obs.alerts().stats();
    println!();
    println!("=== Alerts ===");
    println!();
    println!("Rules:       {} ({} enabled)", stats.total_rules, stats.enabled_rules);
    println!("Active:      {}", stats.active_alerts);
    println!("Total fired: {}", stats.total_alerts);
    println!("Evaluations: {} ({} errors)", stats.evaluations, stats.evaluation_errors);
    for alert in obs.alerts().active_alerts() {
        println!("   [{}] {}", alert.severity, alert.message);
    }

    println!();
    println!("=== Metrics (Prometheus) ===");
    println!();
    print!("{}", obs.metrics().export_prometheus());

    println!();
    println!("=== Self-telemetry ===");
    println!();
    print!("{}", telemetry::gather_text()?);

    Ok(())
}
