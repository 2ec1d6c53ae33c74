// recording/replay.rs - Timed re-emission of recorded events

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::errors::{ReplayError, ReplayResult};
use super::{EventRecording, EventSink, RecordedEvent};
use crate::clock::Clock;
use crate::telemetry;

/// Lifecycle of the replayer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Idle,
    Playing,
    Paused,
    Aborted,
    Completed,
}

impl fmt::Display for ReplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReplayStatus::Idle => "idle",
            ReplayStatus::Playing => "playing",
            ReplayStatus::Paused => "paused",
            ReplayStatus::Aborted => "aborted",
            ReplayStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Latest control request seen by the replay loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayCommand {
    Run,
    Pause,
    Abort,
}

type BeforeEventHook = Box<dyn FnMut(&RecordedEvent) -> bool + Send>;
type CompleteHook = Box<dyn FnOnce() + Send>;

/// Options for a single replay
pub struct ReplayOptions {
    /// Playback rate; 2.0 plays twice as fast. Must be positive and finite.
    pub speed: f64,
    /// Walk the events and call hooks without emitting to the sink
    pub dry_run: bool,
    /// Called before each event; returning `false` skips it
    pub on_before_event: Option<BeforeEventHook>,
    /// Called exactly once when the replay completes or is aborted
    pub on_complete: Option<CompleteHook>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            dry_run: false,
            on_before_event: None,
            on_complete: None,
        }
    }
}

impl fmt::Debug for ReplayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayOptions")
            .field("speed", &self.speed)
            .field("dry_run", &self.dry_run)
            .field("on_before_event", &self.on_before_event.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl ReplayOptions {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_before_event<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&RecordedEvent) -> bool + Send + 'static,
    {
        self.on_before_event = Some(Box::new(hook));
        self
    }

    pub fn with_on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }
}

/// Outcome of a finished replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub status: ReplayStatus,
    /// Events that passed the before-event hook
    pub played: usize,
    pub skipped: usize,
    pub total: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Position of the replay in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayProgress {
    pub status: ReplayStatus,
    /// Events reached so far
    pub index: usize,
    pub total: usize,
}

#[derive(Debug)]
struct ReplayState {
    status: ReplayStatus,
    /// Present exactly while a replay is in flight
    control: Option<watch::Sender<ReplayCommand>>,
    index: usize,
    total: usize,
}

impl ReplayState {
    /// Publish a command if a replay is in one of `from`
    fn command(&mut self, from: &[ReplayStatus], to: ReplayStatus, cmd: ReplayCommand) -> bool {
        if !from.contains(&self.status) {
            return false;
        }
        match &self.control {
            Some(tx) => {
                tx.send_replace(cmd);
                self.status = to;
                true
            }
            None => false,
        }
    }
}

/// Replays recordings into an [`EventSink`], one at a time.
///
/// Before each event the replayer waits for the recorded gap since the
/// previous event divided by the speed, measured from the previous emission.
/// That wait is the only suspension point; pause freezes it, resume continues
/// with the remaining time, abort cancels it.
pub struct Replayer {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    state: Mutex<ReplayState>,
}

impl fmt::Debug for Replayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replayer")
            .field("clock", &self.clock)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Replayer {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            clock,
            sink,
            state: Mutex::new(ReplayState {
                status: ReplayStatus::Idle,
                control: None,
                index: 0,
                total: 0,
            }),
        }
    }

    /// Play `recording` to completion or abort.
    ///
    /// Fails fast, without disturbing a replay in flight, when one is already
    /// running or the speed is invalid. Dropping the returned future counts
    /// as an abort.
    pub async fn replay(
        &self,
        recording: &EventRecording,
        mut options: ReplayOptions,
    ) -> ReplayResult<ReplayReport> {
        if !(options.speed.is_finite() && options.speed > 0.0) {
            return Err(ReplayError::InvalidSpeed(options.speed));
        }

        let mut rx = {
            let mut state = self.state.lock();
            if state.control.is_some() {
                return Err(ReplayError::AlreadyRunning);
            }
            let (tx, rx) = watch::channel(ReplayCommand::Run);
            state.control = Some(tx);
            state.status = ReplayStatus::Playing;
            state.index = 0;
            state.total = recording.events.len();
            rx
        };
        // From here on the slot is released even if this future is dropped
        let slot = ReplaySlot {
            state: &self.state,
            recording_id: &recording.id,
            on_complete: options.on_complete.take(),
            finished: false,
        };

        info!(
            recording = %recording.id,
            events = recording.events.len(),
            speed = options.speed,
            dry_run = options.dry_run,
            "Replay started"
        );

        let started = self.clock.now();
        let mut last_emission = started;
        let mut previous_ms = 0;
        let mut played = 0;
        let mut skipped = 0;
        let mut aborted = false;

        for (i, event) in recording.events.iter().enumerate() {
            let gap_ms = event.relative_time_ms.saturating_sub(previous_ms);
            let deadline = last_emission + scaled(gap_ms, options.speed);

            if !self.wait_until(deadline, &mut rx).await {
                aborted = true;
                break;
            }

            previous_ms = event.relative_time_ms;
            last_emission = self.clock.now();
            self.state.lock().index = i + 1;

            let proceed = match options.on_before_event.as_mut() {
                Some(hook) => hook(event),
                None => true,
            };
            // The hook itself may have aborted the replay
            if *rx.borrow() == ReplayCommand::Abort {
                aborted = true;
                break;
            }
            if !proceed {
                skipped += 1;
                telemetry::REPLAY_EVENTS_SKIPPED_TOTAL.inc();
                continue;
            }

            if !options.dry_run {
                self.sink.emit(event);
                telemetry::REPLAY_EVENTS_EMITTED_TOTAL.inc();
            }
            played += 1;
        }

        let status = if aborted {
            ReplayStatus::Aborted
        } else {
            ReplayStatus::Completed
        };

        let report = ReplayReport {
            status,
            played,
            skipped,
            total: recording.events.len(),
            elapsed: self.clock.now().duration_since(started),
        };

        if aborted {
            telemetry::REPLAYS_ABORTED_TOTAL.inc();
            warn!(recording = %recording.id, played, "Replay aborted");
        } else {
            info!(recording = %recording.id, played, skipped, "Replay completed");
        }

        slot.finish(status);
        Ok(report)
    }

    /// Wait until `deadline`, honouring pause and resume. Returns `false` on abort.
    async fn wait_until(&self, mut deadline: Instant, rx: &mut watch::Receiver<ReplayCommand>) -> bool {
        loop {
            let command = *rx.borrow_and_update();
            match command {
                ReplayCommand::Abort => return false,
                ReplayCommand::Pause => {
                    let remaining = deadline.saturating_duration_since(self.clock.now());
                    debug!(remaining_ms = remaining.as_millis() as u64, "Replay paused");
                    if rx.changed().await.is_err() {
                        return false;
                    }
                    // Resume restarts the frozen remainder from now
                    deadline = self.clock.now() + remaining;
                }
                ReplayCommand::Run => {
                    tokio::select! {
                        _ = self.clock.sleep_until(deadline) => return true,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return false;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Freeze the replay in flight. `false` unless one is playing.
    pub fn pause(&self) -> bool {
        self.state.lock().command(
            &[ReplayStatus::Playing],
            ReplayStatus::Paused,
            ReplayCommand::Pause,
        )
    }

    /// Continue a paused replay. `false` unless one is paused.
    pub fn resume(&self) -> bool {
        self.state.lock().command(
            &[ReplayStatus::Paused],
            ReplayStatus::Playing,
            ReplayCommand::Run,
        )
    }

    /// Cancel the replay in flight, mid-wait included. `false` if none is running.
    pub fn abort(&self) -> bool {
        self.state.lock().command(
            &[ReplayStatus::Playing, ReplayStatus::Paused],
            ReplayStatus::Aborted,
            ReplayCommand::Abort,
        )
    }

    pub fn replay_status(&self) -> ReplayStatus {
        self.state.lock().status
    }

    pub fn replay_progress(&self) -> ReplayProgress {
        let state = self.state.lock();
        ReplayProgress {
            status: state.status,
            index: state.index,
            total: state.total,
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.state.lock().control.is_some()
    }
}

/// Holds the single replay slot for one `replay` call.
///
/// `finish` releases it with the final status. If the replay future is
/// dropped first (timeout, lost `select!`, aborted task) `Drop` releases it as
/// aborted, so `on_complete` still runs exactly once and later replays can start.
struct ReplaySlot<'a> {
    state: &'a Mutex<ReplayState>,
    recording_id: &'a str,
    on_complete: Option<CompleteHook>,
    finished: bool,
}

impl ReplaySlot<'_> {
    fn finish(mut self, status: ReplayStatus) {
        self.finished = true;
        self.release(status);
    }

    fn release(&mut self, status: ReplayStatus) {
        {
            let mut state = self.state.lock();
            state.status = status;
            state.control = None;
        }
        if let Some(done) = self.on_complete.take() {
            done();
        }
    }
}

impl Drop for ReplaySlot<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        telemetry::REPLAYS_ABORTED_TOTAL.inc();
        warn!(recording = %self.recording_id, "Replay dropped before finishing");
        self.release(ReplayStatus::Aborted);
    }
}

/// Recorded gap scaled by playback speed
fn scaled(gap_ms: u64, speed: f64) -> Duration {
    Duration::from_nanos((gap_ms as f64 * 1_000_000.0 / speed).round() as u64)
}
