//! File metadata and busy-file probes
//!
//! Trackers poll these between notifications to catch writes that never
//! fire a notification on some platforms, and to hold back events while
//! a writer still has the file open.

use crate::error::WatchError;
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::trace;

/// Point-in-time view of a file; absent or unreadable files are all zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub exists: bool,
    pub is_file: bool,
}

impl FileSnapshot {
    /// Size or modification time changed between two probes
    pub fn differs(&self, other: &FileSnapshot) -> bool {
        self.size != other.size || self.modified != other.modified
    }
}

/// Probes a tracker uses to look at its file
///
/// Implementations must never fail loudly: errors collapse into
/// "absent" snapshots and "not busy" answers.
pub trait FileProbe: Send + Sync {
    /// Snapshot size, mtime and type
    fn stat(&self, path: &Path) -> FileSnapshot;

    /// Try to open the file for shared reading and close it again
    fn open_shared(&self, path: &Path) -> io::Result<()>;

    /// Heuristic for "a writer holds the file exclusively"
    ///
    /// Only existing regular files can be busy. A permission error means
    /// we cannot tell, so the file is assumed available.
    fn is_busy(&self, path: &Path, snapshot: &FileSnapshot) -> bool {
        if !snapshot.exists || !snapshot.is_file {
            return false;
        }
        match self.open_shared(path) {
            Ok(()) => false,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                trace!("open probe denied for {}: {}", path.display(), err);
                false
            }
            Err(err) => {
                trace!("{}", probe_failure("open", path, &err));
                true
            }
        }
    }
}

/// Probe backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn stat(&self, path: &Path) -> FileSnapshot {
        match std::fs::metadata(path) {
            Ok(meta) => FileSnapshot {
                size: meta.len(),
                modified: meta.modified().ok(),
                exists: true,
                is_file: meta.is_file(),
            },
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    trace!("{}", probe_failure("stat", path, &err));
                }
                FileSnapshot::default()
            }
        }
    }

    fn open_shared(&self, path: &Path) -> io::Result<()> {
        File::open(path).map(drop)
    }
}

fn probe_failure(probe: &str, path: &Path, err: &io::Error) -> WatchError {
    WatchError::ProbeFailure(format!("{} {}: {}", probe, path.display(), err))
}

/// Check whether anything exists at `path`
pub fn file_exists(path: &Path) -> bool {
    !path.as_os_str().is_empty() && std::fs::metadata(path).is_ok()
}

/// Size and modification time, or zero values when unavailable
pub fn file_size_and_mod_time(path: &Path) -> (u64, Option<SystemTime>) {
    let snapshot = FsProbe.stat(path);
    (snapshot.size, snapshot.modified)
}
