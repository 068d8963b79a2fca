//! Raw notification → canonical event mapping

use crate::error::WatchError;
use crate::event::{EventKind, WatchEvent};
use crate::probe::file_exists;
use crate::source::RawEvent;
use std::path::{Path, PathBuf};

/// Classify a raw notification from `dir` into exactly one event
///
/// Flags are checked in priority order: modify, create, attrib, rename,
/// delete. A rename is resolved by looking at the file afterwards, so
/// its outcome is a guess and marked with the rename hint.
pub fn normalize(dir: &Path, raw: RawEvent) -> WatchEvent {
    let path = full_name(dir, &raw.name);
    let flags = raw.flags;

    let mut rename_hint = false;

    let kind = if flags.modify {
        EventKind::Modified
    } else if flags.create {
        EventKind::Created
    } else if flags.attrib {
        EventKind::Modified
    } else if flags.rename {
        rename_hint = true;
        if file_exists(&path) {
            EventKind::Created
        } else {
            EventKind::Deleted
        }
    } else if flags.delete {
        EventKind::Deleted
    } else {
        EventKind::Error(WatchError::UnknownEventKind)
    };

    let event = WatchEvent::new(path, kind, dir);
    if rename_hint {
        event.with_rename_hint()
    } else {
        event
    }
}

/// Absolute path of `name` inside `dir`
///
/// Any directory part embedded in `name` is dropped (both separator
/// styles). When the path cannot be made absolute the plain join is
/// returned instead.
pub fn full_name(dir: &Path, name: &Path) -> PathBuf {
    let name = match name.to_str() {
        Some(s) if s.contains('\\') => PathBuf::from(s.replace('\\', "/")),
        _ => name.to_path_buf(),
    };

    let joined = match name.file_name() {
        Some(base) => dir.join(base),
        None => dir.to_path_buf(),
    };

    std::path::absolute(&joined).unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawFlags;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_flag_mapping() {
        let dir = Path::new("/watched");
        let kind = |flags: RawFlags| normalize(dir, RawEvent::new("f.txt", flags)).kind;

        assert_eq!(kind(RawFlags::modify()), EventKind::Modified);
        assert_eq!(kind(RawFlags::attrib()), EventKind::Modified);
        assert_eq!(kind(RawFlags::create()), EventKind::Created);
        assert_eq!(kind(RawFlags::delete()), EventKind::Deleted);
        assert_eq!(
            kind(RawFlags::default()),
            EventKind::Error(WatchError::UnknownEventKind)
        );
    }

    #[test]
    fn test_flag_priority() {
        let dir = Path::new("/watched");
        let both = RawFlags {
            modify: true,
            create: true,
            ..Default::default()
        };
        let create_attrib = RawFlags {
            create: true,
            attrib: true,
            ..Default::default()
        };

        assert!(normalize(dir, RawEvent::new("f", both)).is_modified());
        assert!(normalize(dir, RawEvent::new("f", create_attrib)).is_created());
    }

    #[test]
    fn test_rename_uses_existence() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("here.txt"), b"x").unwrap();

        let arrived = normalize(temp_dir.path(), RawEvent::new("here.txt", RawFlags::rename()));
        let left = normalize(temp_dir.path(), RawEvent::new("gone.txt", RawFlags::rename()));

        assert!(arrived.is_created() && arrived.rename_hint);
        assert!(left.is_deleted() && left.rename_hint);
        assert!(!normalize(temp_dir.path(), RawEvent::new("x", RawFlags::create())).rename_hint);
    }

    #[test]
    fn test_full_name_strips_embedded_dirs() {
        let dir = Path::new("/watched");

        assert_eq!(full_name(dir, Path::new("a.txt")), PathBuf::from("/watched/a.txt"));
        assert_eq!(full_name(dir, Path::new("/other/dir/a.txt")), PathBuf::from("/watched/a.txt"));
        assert_eq!(full_name(dir, Path::new("sub\\deep\\a.txt")), PathBuf::from("/watched/a.txt"));
    }

    #[test]
    fn test_full_name_is_absolute() {
        let resolved = full_name(Path::new("relative/dir"), Path::new("a.txt"));

        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("relative/dir/a.txt"));
    }

    #[test]
    fn test_event_carries_watched_dir() {
        let event = normalize(Path::new("/watched"), RawEvent::new("a", RawFlags::modify()));

        assert_eq!(event.watched_dir, PathBuf::from("/watched"));
        assert!(!event.startup);
    }
}
