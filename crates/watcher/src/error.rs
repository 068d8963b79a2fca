//! Error taxonomy for directory watches
//!
//! Every fault that happens while a watch is running travels to the
//! consumer inside an `EventKind::Error` event, so the type is `Clone`
//! and carries rendered messages instead of source errors.

use thiserror::Error;

/// Errors produced by the watcher, either returned from setup calls or
/// delivered on the event stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// The raw event source reported a fault on its error channel
    #[error("watch source fault: {0}")]
    SourceFault(String),

    /// The caller asked the watcher to stop
    #[error("monitor stop request")]
    StopRequested,

    /// The process-wide shutdown token was cancelled
    #[error("app shutdown")]
    ShutdownRequested,

    /// The raw event source ended on its own
    #[error("watcher stopped working")]
    SourceStopped,

    /// The raw event source could not be created for a directory
    #[error("failed to watch directory: {0}")]
    WatchFailed(String),

    /// A raw notification carried no flag the normalizer understands
    #[error("strange event type from internal watcher")]
    UnknownEventKind,

    /// A metadata or open probe failed; absorbed locally, never emitted
    #[error("file probe failed: {0}")]
    ProbeFailure(String),

    /// `watch_dirs` was called without any directory
    #[error("no directories to watch")]
    NoDirectories,

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl WatchError {
    /// Whether the directory that produced this error has stopped for good.
    ///
    /// After a terminal error no further events arrive for that directory.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WatchError::StopRequested
                | WatchError::ShutdownRequested
                | WatchError::SourceStopped
                | WatchError::WatchFailed(_)
        )
    }
}

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        WatchError::WatchFailed(err.to_string())
    }
}

/// Result type for watcher setup operations
pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_errors() {
        assert!(WatchError::StopRequested.is_terminal());
        assert!(WatchError::ShutdownRequested.is_terminal());
        assert!(WatchError::SourceStopped.is_terminal());
        assert!(WatchError::WatchFailed("gone".into()).is_terminal());

        assert!(!WatchError::SourceFault("overflow".into()).is_terminal());
        assert!(!WatchError::UnknownEventKind.is_terminal());
        assert!(!WatchError::ProbeFailure("denied".into()).is_terminal());
    }

    #[test]
    fn test_messages() {
        assert_eq!(WatchError::StopRequested.to_string(), "monitor stop request");
        assert_eq!(WatchError::ShutdownRequested.to_string(), "app shutdown");
        assert_eq!(
            WatchError::SourceFault("queue overflow".into()).to_string(),
            "watch source fault: queue overflow"
        );
    }
}
