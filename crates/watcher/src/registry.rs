//! Per-directory tracker registry
//!
//! Routes normalized events: bursts go to a (lazily created) tracker,
//! deletions go through the path's tracker if one exists so its queue is
//! flushed first, everything else goes straight to the output stream.

use crate::event::{EventKind, WatchEvent};
use crate::output::EventSender;
use crate::probe::{FileProbe, FsProbe};
use crate::tracker::Tracker;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

struct RegistryInner {
    trackers: DashMap<PathBuf, Arc<Tracker>>,
    output: EventSender,
    quiet_period: Option<Duration>,
    probe: Arc<dyn FileProbe>,
}

/// Mapping from path to tracker for one watched directory
///
/// Cheap to clone; clones share the same map. Every tracker's watchdog
/// holds a clone, so the registry lives at least as long as its trackers.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Registry probing the real filesystem.
    /// `None` as quiet period disables coalescing.
    pub fn new(quiet_period: Option<Duration>, output: EventSender) -> Self {
        Self::with_probe(quiet_period, output, Arc::new(FsProbe))
    }

    /// Registry with a custom probe
    pub fn with_probe(
        quiet_period: Option<Duration>,
        output: EventSender,
        probe: Arc<dyn FileProbe>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                trackers: DashMap::new(),
                output,
                quiet_period,
                probe,
            }),
        }
    }

    pub fn quiet_period(&self) -> Option<Duration> {
        self.inner.quiet_period
    }

    /// Route one normalized event
    ///
    /// Must be called from within a tokio runtime: the first burst for a
    /// path spawns that tracker's watchdog task.
    pub async fn route(&self, event: WatchEvent) {
        let Some(quiet_period) = self.inner.quiet_period else {
            self.inner.output.send(event).await;
            return;
        };

        match event.kind {
            EventKind::Created | EventKind::Modified => {
                let mut event = event;
                loop {
                    let tracker = self.tracker_for(&event.path, quiet_period);
                    match tracker.process(event).await {
                        Ok(()) => return,
                        Err(returned) => {
                            // Retired between lookup and process
                            self.deregister(&tracker);
                            event = returned;
                        }
                    }
                }
            }
            EventKind::Deleted => {
                let tracker = self.inner.trackers.get(&event.path).map(|t| Arc::clone(t.value()));
                let unhandled = match tracker {
                    Some(tracker) => tracker.process(event).await.err(),
                    None => Some(event),
                };
                if let Some(event) = unhandled {
                    self.inner.output.send(event).await;
                }
            }
            EventKind::Error(_) => self.inner.output.send(event).await,
        }
    }

    /// Release every queued event right away
    ///
    /// Called once the directory's watch has ended and no more events
    /// will be routed. Trackers stay registered and retire on their own.
    pub async fn flush_pending(&self) -> usize {
        let trackers: Vec<Arc<Tracker>> = self
            .inner
            .trackers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut flushed = 0;
        for tracker in trackers {
            if tracker.flush().await {
                flushed += 1;
            }
        }
        flushed
    }

    /// Whether a tracker currently exists for `path`
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.trackers.contains_key(path)
    }

    /// Number of live trackers
    pub fn len(&self) -> usize {
        self.inner.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.trackers.is_empty()
    }

    fn tracker_for(&self, path: &Path, quiet_period: Duration) -> Arc<Tracker> {
        if let Some(tracker) = self.inner.trackers.get(path) {
            return Arc::clone(tracker.value());
        }

        // Probe before taking the shard lock
        let snapshot = self.inner.probe.stat(path);

        let mut created = None;
        let tracker = {
            let entry = self
                .inner
                .trackers
                .entry(path.to_path_buf())
                .or_insert_with(|| {
                    let tracker = Arc::new(Tracker::with_snapshot(
                        path.to_path_buf(),
                        quiet_period,
                        Arc::clone(&self.inner.probe),
                        self.inner.output.clone(),
                        snapshot,
                    ));
                    created = Some(Arc::clone(&tracker));
                    tracker
                });
            Arc::clone(entry.value())
        };

        if let Some(tracker) = created {
            debug!("Tracking {}", path.display());
            self.spawn_watchdog(tracker);
        }
        tracker
    }

    fn spawn_watchdog(&self, tracker: Arc<Tracker>) {
        let registry = self.clone();
        tokio::spawn(async move {
            Arc::clone(&tracker).watchdog().await;
            registry.deregister(&tracker);
        });
    }

    /// Drop a retired tracker; a newer tracker for the same path is kept
    pub(crate) fn deregister(&self, tracker: &Arc<Tracker>) {
        let removed = self
            .inner
            .trackers
            .remove_if(tracker.path(), |_, current| Arc::ptr_eq(current, tracker));
        if removed.is_some() {
            debug!("Stopped tracking {}", tracker.path().display());
        }
    }
}
