// clock.rs - Time source shared by the alert engine, recorder and replayer

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::time::Instant;

/// Monotonic time plus a cancellable wait.
///
/// Cooldowns, relative event times and replay waits are all measured against
/// `now()`; the replayer's only suspension point is `sleep_until`, which is
/// dropped (and thereby cancelled) when a pause or abort wins the race.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Current wall-clock time, used only for display timestamps
    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Suspend until `deadline`
    async fn sleep_until(&self, deadline: Instant);
}

/// Clock backed by the tokio timer.
///
/// Under `#[tokio::test(start_paused = true)]` tokio's clock is virtual, which
/// makes replay timing deterministic in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_follows_virtual_time() {
        let clock = TokioClock;
        let start = clock.now();

        clock.sleep_until(start + Duration::from_millis(250)).await;

        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }
}
