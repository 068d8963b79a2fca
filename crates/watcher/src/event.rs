//! Canonical file events delivered to the application

use crate::error::WatchError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Type of file system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// File appeared (or was found at startup)
    Created,

    /// File content or attributes changed
    Modified,

    /// File disappeared
    Deleted,

    /// The watch hit a fault; see [`WatchError::is_terminal`]
    Error(WatchError),
}

impl EventKind {
    /// Created and Modified events are eligible for coalescing
    pub fn is_burst(&self) -> bool {
        matches!(self, EventKind::Created | EventKind::Modified)
    }
}

/// File system event as seen by the application
///
/// Events are never mutated after construction; a tracker replaces a
/// queued event wholesale when a newer one supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path of the file (the identity key)
    pub path: PathBuf,

    /// Type of change
    pub kind: EventKind,

    /// Directory whose watch produced the event
    pub watched_dir: PathBuf,

    /// True only for the synthetic events listing pre-existing files
    pub startup: bool,

    /// Best-effort guess that the event came from a rename.
    /// Can be false when it should be true; never rely on it.
    pub rename_hint: bool,
}

impl WatchEvent {
    /// Create a new live event
    pub fn new(path: impl Into<PathBuf>, kind: EventKind, watched_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind,
            watched_dir: watched_dir.into(),
            startup: false,
            rename_hint: false,
        }
    }

    /// Synthetic Created event for a file that existed when watching began
    pub fn startup(path: impl Into<PathBuf>, watched_dir: impl Into<PathBuf>) -> Self {
        Self {
            startup: true,
            ..Self::new(path, EventKind::Created, watched_dir)
        }
    }

    /// Directory-level error; the path is the watched directory itself
    pub fn error(watched_dir: &Path, error: WatchError) -> Self {
        Self::new(watched_dir, EventKind::Error(error), watched_dir)
    }

    /// Mark the event as probably caused by a rename
    pub fn with_rename_hint(mut self) -> Self {
        self.rename_hint = true;
        self
    }

    pub fn is_created(&self) -> bool {
        self.kind == EventKind::Created
    }

    pub fn is_modified(&self) -> bool {
        self.kind == EventKind::Modified
    }

    pub fn is_deleted(&self) -> bool {
        self.kind == EventKind::Deleted
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error(_))
    }

    /// The carried error, present only for `EventKind::Error`
    pub fn error_kind(&self) -> Option<&WatchError> {
        match &self.kind {
            EventKind::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this is the last event its directory will produce
    pub fn is_terminal(&self) -> bool {
        self.error_kind().is_some_and(WatchError::is_terminal)
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match &self.kind {
            EventKind::Error(err) => return write!(f, "{}", err),
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
            EventKind::Created if self.startup => "found",
            EventKind::Created => "created",
        };

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        write!(
            f,
            "file `{}` of dir `{}` {}",
            name,
            self.watched_dir.display(),
            verb
        )?;

        if self.rename_hint {
            write!(f, " (after renaming)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_live_events() {
        let dir = Path::new("/data/inbox");
        let modified = WatchEvent::new(dir.join("a.txt"), EventKind::Modified, dir);
        let deleted = WatchEvent::new(dir.join("a.txt"), EventKind::Deleted, dir);

        assert_eq!(modified.to_string(), "file `a.txt` of dir `/data/inbox` modified");
        assert_eq!(deleted.to_string(), "file `a.txt` of dir `/data/inbox` deleted");
    }

    #[test]
    fn test_display_startup_and_rename() {
        let dir = Path::new("/data/inbox");
        let found = WatchEvent::startup(dir.join("b.bin"), dir);
        let renamed = WatchEvent::new(dir.join("c.bin"), EventKind::Created, dir).with_rename_hint();

        assert_eq!(found.to_string(), "file `b.bin` of dir `/data/inbox` found");
        assert_eq!(
            renamed.to_string(),
            "file `c.bin` of dir `/data/inbox` created (after renaming)"
        );
    }

    #[test]
    fn test_error_events() {
        let dir = Path::new("/data/inbox");
        let stop = WatchEvent::error(dir, WatchError::StopRequested);

        assert!(stop.is_error());
        assert!(stop.is_terminal());
        assert!(!stop.kind.is_burst());
        assert_eq!(stop.error_kind(), Some(&WatchError::StopRequested));
        assert_eq!(stop.to_string(), "monitor stop request");

        let unknown = WatchEvent::error(dir, WatchError::UnknownEventKind);
        assert!(!unknown.is_terminal());
    }

    #[test]
    fn test_burst_kinds() {
        assert!(EventKind::Created.is_burst());
        assert!(EventKind::Modified.is_burst());
        assert!(!EventKind::Deleted.is_burst());
        assert!(!EventKind::Error(WatchError::UnknownEventKind).is_burst());
    }
}
