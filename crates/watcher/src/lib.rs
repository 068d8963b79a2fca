//! Coalescing file system watcher
//!
//! Turns the noisy notification stream of one or more flat directories
//! into three events per file: Created, Modified, Deleted.
//! - Per-path trackers collapse a write burst into one event
//! - A burst is released once notifications, size/mtime and the
//!   busy-file probe have all been quiet for the quiet period
//! - Idle trackers retire themselves
//! - Pre-existing files are reported once at startup
//!
//! ```no_run
//! # async fn demo() -> settle_watcher::Result<()> {
//! let mut watcher = settle_watcher::DirsWatcher::watch_dir("./inbox")?;
//! while let Some(event) = watcher.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod dir;
pub mod error;
pub mod event;
pub mod normalize;
pub mod output;
pub mod probe;
pub mod registry;
pub mod source;
pub mod tracker;

pub use config::{WatcherConfig, DEFAULT_QUIET_PERIOD_MS, EVENTS_QUEUE_CAPACITY};
pub use error::{Result, WatchError};
pub use event::{EventKind, WatchEvent};
pub use output::EventSender;
pub use probe::{file_exists, file_size_and_mod_time, FileProbe, FileSnapshot, FsProbe};
pub use registry::Registry;
pub use source::{NotifySource, RawEvent, RawFlags, RawSource, SourceItem};
pub use tokio_util::sync::CancellationToken;

use dir::DirTask;
use output::event_channel;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Watch over a set of flat directories
///
/// Owns the consumer end of the shared event stream. Each directory runs
/// in its own task with its own tracker registry; all of them feed the
/// same bounded stream.
pub struct DirsWatcher {
    dirs: Vec<PathBuf>,
    config: WatcherConfig,
    events: mpsc::Receiver<WatchEvent>,
    stop: CancellationToken,
}

impl DirsWatcher {
    /// Watch one directory with the default configuration
    pub fn watch_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::watch_dirs(
            [dir.as_ref().to_path_buf()],
            WatcherConfig::default(),
            CancellationToken::new(),
        )
    }

    /// Watch several directories through the platform's notify backend
    ///
    /// A directory that cannot be watched reports a single terminal
    /// `WatchFailed` event; the others keep running. Must be called from
    /// within a tokio runtime.
    pub fn watch_dirs(
        dirs: impl IntoIterator<Item = PathBuf>,
        config: WatcherConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let dirs: Vec<PathBuf> = dirs.into_iter().collect();
        let sources = dirs.iter().map(|dir| {
            let source = NotifySource::watch(dir);
            (dir.clone(), source)
        });
        Self::spawn(sources.collect(), config, shutdown, Arc::new(FsProbe))
    }

    /// Watch directories fed by caller-provided sources
    pub fn with_sources<S: RawSource>(
        sources: impl IntoIterator<Item = (PathBuf, S)>,
        config: WatcherConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        Self::with_sources_and_probe(sources, config, shutdown, Arc::new(FsProbe))
    }

    /// Like [`with_sources`](Self::with_sources) with a custom file probe
    pub fn with_sources_and_probe<S: RawSource>(
        sources: impl IntoIterator<Item = (PathBuf, S)>,
        config: WatcherConfig,
        shutdown: CancellationToken,
        probe: Arc<dyn FileProbe>,
    ) -> Result<Self> {
        let sources = sources
            .into_iter()
            .map(|(dir, source)| (dir, Ok(source)))
            .collect();
        Self::spawn(sources, config, shutdown, probe)
    }

    fn spawn<S: RawSource>(
        sources: Vec<(PathBuf, Result<S>)>,
        config: WatcherConfig,
        shutdown: CancellationToken,
        probe: Arc<dyn FileProbe>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(WatchError::NoDirectories);
        }
        config.validate()?;

        let (output, events) = event_channel(config.queue_capacity);
        let stop = CancellationToken::new();
        let mut dirs = Vec::with_capacity(sources.len());

        for (dir, source) in sources {
            let task = DirTask {
                dir: dir.clone(),
                registry: Registry::with_probe(
                    config.quiet_period(),
                    output.clone(),
                    Arc::clone(&probe),
                ),
                output: output.clone(),
                stop: stop.clone(),
                shutdown: shutdown.clone(),
            };
            tokio::spawn(task.run(source));
            dirs.push(dir);
        }

        Ok(Self {
            dirs,
            config,
            events,
            stop,
        })
    }

    /// Next event; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    /// Direct access to the consumer end of the stream
    pub fn events(&mut self) -> &mut mpsc::Receiver<WatchEvent> {
        &mut self.events
    }

    /// Ask every directory task to finish
    ///
    /// Each directory answers with one `StopRequested` error event.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }
}

impl std::fmt::Debug for DirsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirsWatcher")
            .field("dirs", &self.dirs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
