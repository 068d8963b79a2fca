//! Per-directory watch task

use crate::error::WatchError;
use crate::event::WatchEvent;
use crate::normalize::normalize;
use crate::output::EventSender;
use crate::registry::Registry;
use crate::source::{RawSource, SourceItem};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Everything one directory task needs
pub(crate) struct DirTask {
    pub dir: PathBuf,
    pub registry: Registry,
    pub output: EventSender,
    pub stop: CancellationToken,
    pub shutdown: CancellationToken,
}

impl DirTask {
    /// Emit the startup snapshot, then pump the source until told to stop
    ///
    /// Produces exactly one terminal error event before returning, after
    /// releasing whatever the trackers still hold. The trackers themselves
    /// are left alone and retire on their own.
    pub async fn run<S: RawSource>(self, source: Result<S, WatchError>) {
        self.emit_startup_snapshot().await;

        let mut source = match source {
            Ok(source) => source,
            Err(err) => {
                warn!("Cannot watch {}: {}", self.dir.display(), err);
                self.output.send(WatchEvent::error(&self.dir, err)).await;
                return;
            }
        };

        info!("Watching {}", self.dir.display());

        let cause = loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break WatchError::StopRequested,
                _ = self.shutdown.cancelled() => break WatchError::ShutdownRequested,
                item = source.recv() => match item {
                    Some(SourceItem::Event(raw)) => {
                        let event = normalize(&self.dir, raw);
                        self.registry.route(event).await;
                    }
                    Some(SourceItem::Fault(message)) => {
                        warn!("Watch error in {}: {}", self.dir.display(), message);
                        let err = WatchError::SourceFault(message);
                        self.output.send(WatchEvent::error(&self.dir, err)).await;
                    }
                    None => break WatchError::SourceStopped,
                },
            }
        };

        source.close();

        // Nothing may follow the terminal event
        let flushed = self.registry.flush_pending().await;
        if flushed > 0 {
            debug!("Flushed {} pending events for {}", flushed, self.dir.display());
        }

        info!("Stopped watching {}: {}", self.dir.display(), cause);
        self.output.send(WatchEvent::error(&self.dir, cause)).await;
    }

    async fn emit_startup_snapshot(&self) {
        let dir = self.dir.clone();
        let entries = match tokio::task::spawn_blocking(move || startup_entries(&dir)).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Startup scan of {} failed: {}", self.dir.display(), err);
                Vec::new()
            }
        };
        debug!("{} existing entries in {}", entries.len(), self.dir.display());

        for path in entries {
            self.output.send(WatchEvent::startup(path, &self.dir)).await;
        }
    }
}

/// Direct children of `dir`, sorted by name, as absolute paths
///
/// Unreadable directories and entries are skipped.
pub(crate) fn startup_entries(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| crate::normalize::full_name(dir, Path::new(entry.file_name())))
        .collect()
}
