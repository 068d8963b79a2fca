//! Per-file debounce tracker
//!
//! One tracker exists for every path that is currently producing
//! traffic. It holds at most one pending Created/Modified event and
//! releases it once the file has been quiet for a full quiet period:
//! no new burst notifications, no size/mtime change between probes,
//! and no writer holding it open. After twice the quiet period without
//! any activity the tracker retires itself.
//!
//! The state machine is driven by [`Tracker::tick`], which
//! [`Tracker::watchdog`] calls on a timer. Both `tick` and
//! [`Tracker::process`] take the same lock, and every forward to the
//! output stream happens while holding it, so per-path ordering holds.

use crate::config::probe_interval;
use crate::event::WatchEvent;
use crate::output::EventSender;
use crate::probe::{FileProbe, FileSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Added to a flush deadline so the strict "longer than" check holds on wake
const DEADLINE_SLACK: Duration = Duration::from_millis(1);

/// Outcome of one watchdog tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Tracker is still alive; tick again after this long
    Continue(Duration),

    /// Tracker went idle and retired; drop it from the registry
    Retired,
}

struct TrackerState {
    /// Most recent event of any kind
    last_activity: Instant,

    /// Most recent Created/Modified event
    last_burst: Instant,

    /// Most recent probe that saw the file change, busy, or just released
    last_unsettled: Option<Instant>,

    /// Pending Created/Modified event
    queued: Option<WatchEvent>,

    /// Snapshot taken by the previous probe
    snapshot: FileSnapshot,

    was_busy: bool,
    retired: bool,
}

/// Debounce state for a single path
pub struct Tracker {
    path: PathBuf,
    quiet_period: Duration,
    probe: Arc<dyn FileProbe>,
    output: EventSender,
    state: Mutex<TrackerState>,
}

impl Tracker {
    /// Create a tracker; the first probe snapshot is taken right away
    pub fn new(
        path: PathBuf,
        quiet_period: Duration,
        probe: Arc<dyn FileProbe>,
        output: EventSender,
    ) -> Self {
        let snapshot = probe.stat(&path);
        Self::with_snapshot(path, quiet_period, probe, output, snapshot)
    }

    /// Create a tracker from a snapshot the caller already took
    pub fn with_snapshot(
        path: PathBuf,
        quiet_period: Duration,
        probe: Arc<dyn FileProbe>,
        output: EventSender,
        snapshot: FileSnapshot,
    ) -> Self {
        let now = Instant::now();

        Self {
            path,
            quiet_period,
            probe,
            output,
            state: Mutex::new(TrackerState {
                last_activity: now,
                last_burst: now,
                last_unsettled: None,
                queued: None,
                snapshot,
                was_busy: false,
                retired: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time between two watchdog probes
    pub fn probe_interval(&self) -> Duration {
        probe_interval(self.quiet_period)
    }

    /// Whether an event is waiting for the quiet period
    pub async fn has_queued(&self) -> bool {
        self.state.lock().await.queued.is_some()
    }

    /// Feed one event for this path
    ///
    /// Created/Modified events are queued (last one wins, except that a
    /// queued Created is kept over a later Modified, and a second Created
    /// pushes the first one out immediately). Any other event flushes the
    /// queue and is then forwarded as is.
    ///
    /// Returns the event back if the tracker has already retired; the
    /// caller must route it to a fresh tracker.
    pub async fn process(&self, event: WatchEvent) -> Result<(), WatchEvent> {
        let mut state = self.state.lock().await;
        if state.retired {
            return Err(event);
        }

        let now = Instant::now();
        state.last_activity = now;

        if event.kind.is_burst() {
            state.last_burst = now;
            match state.queued.take() {
                Some(queued) if queued.is_created() && event.is_created() => {
                    // Two creates in a row: a real delete+recreate, keep both
                    self.output.send(queued).await;
                    state.queued = Some(event);
                }
                Some(queued) if queued.is_created() => state.queued = Some(queued),
                _ => state.queued = Some(event),
            }
        } else {
            if let Some(queued) = state.queued.take() {
                self.output.send(queued).await;
            }
            self.output.send(event).await;
        }

        Ok(())
    }

    /// Release the queued event now, without waiting for the quiet period
    ///
    /// Used when the directory stops, so nothing is left to surface after
    /// its terminal event. Returns whether an event was released.
    pub async fn flush(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.queued.take() {
            Some(queued) => {
                debug!("Flushing {:?} for {}", queued.kind, self.path.display());
                self.output.send(queued).await;
                true
            }
            None => false,
        }
    }

    /// Probe the file once and advance the state machine
    pub async fn tick(&self, now: Instant) -> Tick {
        let mut state = self.state.lock().await;
        if state.retired {
            return Tick::Retired;
        }

        let snapshot = self.probe.stat(&self.path);
        let changed = snapshot.differs(&state.snapshot);
        let busy = self.probe.is_busy(&self.path, &snapshot);
        state.snapshot = snapshot;

        if changed || busy || state.was_busy {
            state.last_unsettled = Some(now);
        }
        state.was_busy = busy;

        let interval = self.probe_interval();

        let Some(queued) = state.queued.take() else {
            let idle = now.saturating_duration_since(state.last_activity);
            if idle > self.quiet_period * 2 && !changed && !busy {
                debug!("Retiring tracker for {} (idle {:?})", self.path.display(), idle);
                state.retired = true;
                return Tick::Retired;
            }
            return Tick::Continue(interval);
        };

        let settled_since = state
            .last_unsettled
            .map_or(state.last_burst, |t| t.max(state.last_burst));

        if now.saturating_duration_since(settled_since) > self.quiet_period && !changed && !busy {
            debug!("Releasing {:?} for {}", queued.kind, self.path.display());
            self.output.send(queued).await;
            return Tick::Continue(interval);
        }

        state.queued = Some(queued);
        let deadline = settled_since + self.quiet_period + DEADLINE_SLACK;
        let until_deadline = deadline.saturating_duration_since(now).max(DEADLINE_SLACK);
        Tick::Continue(interval.min(until_deadline))
    }

    /// Tick on a timer until the tracker retires
    pub async fn watchdog(self: Arc<Self>) {
        let mut wait = self.probe_interval();
        loop {
            tokio::time::sleep(wait).await;
            match self.tick(Instant::now()).await {
                Tick::Continue(next) => wait = next,
                Tick::Retired => return,
            }
        }
    }
}
