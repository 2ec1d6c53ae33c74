// alerting/monitor.rs - Periodic evaluation for hosts without their own scheduler

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::AlertEngine;

/// Shortest period the monitor will tick at
pub const MIN_MONITOR_PERIOD: Duration = Duration::from_millis(1);

/// Start a background task that calls `evaluate_now` every `period`.
///
/// The first pass runs immediately. A period below [`MIN_MONITOR_PERIOD`],
/// zero included, is raised to it. Abort the returned handle to stop it.
pub fn spawn_alert_monitor(engine: Arc<AlertEngine>, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_MONITOR_PERIOD);
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let summary = engine.evaluate_now();
            debug!(
                rules = summary.rules_evaluated,
                opened = summary.opened,
                resolved = summary.resolved,
                "Alert monitor tick"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRegistry;

    #[tokio::test(start_paused = true)]
    async fn test_background_monitoring() {
        let engine = Arc::new(AlertEngine::with_log_handler(Arc::new(
            MetricRegistry::default(),
        )));

        let handle = spawn_alert_monitor(engine.clone(), Duration::from_secs(1));

        // Ticks at 0s, 1s and 2s
        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();

        assert_eq!(engine.stats().evaluations, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_raised_to_minimum() {
        let engine = Arc::new(AlertEngine::with_log_handler(Arc::new(
            MetricRegistry::default(),
        )));

        let handle = spawn_alert_monitor(engine.clone(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Still running, ticking every millisecond
        assert!(!handle.is_finished());
        handle.abort();
        assert!(engine.stats().evaluations >= 5);
    }
}
