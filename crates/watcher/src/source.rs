//! Raw event sources
//!
//! A source delivers unstructured per-directory notifications. Ordering
//! is whatever the OS gives us and flags are best effort; the normalizer
//! and trackers downstream are built to tolerate both.

use crate::error::Result;
use async_trait::async_trait;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// Flag set of a raw notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFlags {
    pub modify: bool,
    pub create: bool,
    pub attrib: bool,
    pub rename: bool,
    pub delete: bool,
}

impl RawFlags {
    pub fn modify() -> Self {
        Self { modify: true, ..Self::default() }
    }

    pub fn create() -> Self {
        Self { create: true, ..Self::default() }
    }

    pub fn attrib() -> Self {
        Self { attrib: true, ..Self::default() }
    }

    pub fn rename() -> Self {
        Self { rename: true, ..Self::default() }
    }

    pub fn delete() -> Self {
        Self { delete: true, ..Self::default() }
    }
}

/// One raw notification: a relative or absolute name plus its flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub name: PathBuf,
    pub flags: RawFlags,
}

impl RawEvent {
    pub fn new(name: impl Into<PathBuf>, flags: RawFlags) -> Self {
        Self {
            name: name.into(),
            flags,
        }
    }
}

/// Item read from a source: a notification or a fault from its error channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    Event(RawEvent),
    Fault(String),
}

/// Per-directory stream of raw notifications
#[async_trait]
pub trait RawSource: Send + 'static {
    /// Next notification or fault; `None` once the source has ended.
    ///
    /// Must be cancel-safe: the directory task races it against its
    /// stop signals.
    async fn recv(&mut self) -> Option<SourceItem>;

    /// Release the underlying OS resources
    fn close(&mut self) {}
}

#[async_trait]
impl RawSource for mpsc::Receiver<SourceItem> {
    async fn recv(&mut self) -> Option<SourceItem> {
        mpsc::Receiver::recv(self).await
    }

    fn close(&mut self) {
        mpsc::Receiver::close(self);
    }
}

/// Source backed by the platform's recommended `notify` watcher
///
/// Watches a single directory non-recursively.
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
    rx: mpsc::UnboundedReceiver<SourceItem>,
}

impl NotifySource {
    /// Start watching `dir`
    pub fn watch(dir: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let items: Vec<SourceItem> = match res {
                Ok(event) => raw_events(event)
                    .into_iter()
                    .map(SourceItem::Event)
                    .collect(),
                Err(err) => vec![SourceItem::Fault(err.to_string())],
            };
            for item in items {
                // Receiver gone means the directory task already finished
                if tx.send(item).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!("notify watcher attached to {}", dir.display());

        Ok(Self {
            watcher: Some(watcher),
            rx,
        })
    }
}

#[async_trait]
impl RawSource for NotifySource {
    async fn recv(&mut self) -> Option<SourceItem> {
        self.rx.recv().await
    }

    fn close(&mut self) {
        // Dropping the watcher unregisters it from the OS
        self.watcher.take();
        self.rx.close();
    }
}

/// Translate a notify event into one raw event per path
///
/// Access events are dropped; unclassifiable kinds come through with no
/// flags so the normalizer reports them.
fn raw_events(event: Event) -> Vec<RawEvent> {
    let flags = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => RawFlags::create(),
        EventKind::Modify(ModifyKind::Metadata(_)) => RawFlags::attrib(),
        EventKind::Modify(ModifyKind::Name(_)) => RawFlags::rename(),
        EventKind::Modify(_) => RawFlags::modify(),
        EventKind::Remove(_) => RawFlags::delete(),
        EventKind::Any | EventKind::Other => RawFlags::default(),
    };

    event
        .paths
        .into_iter()
        .map(|path| RawEvent::new(path, flags))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_notify_kind_mapping() {
        let cases = [
            (EventKind::Create(CreateKind::File), RawFlags::create()),
            (EventKind::Modify(ModifyKind::Data(DataChange::Content)), RawFlags::modify()),
            (EventKind::Modify(ModifyKind::Any), RawFlags::modify()),
            (EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)), RawFlags::attrib()),
            (EventKind::Modify(ModifyKind::Name(RenameMode::From)), RawFlags::rename()),
            (EventKind::Remove(RemoveKind::File), RawFlags::delete()),
            (EventKind::Other, RawFlags::default()),
        ];

        for (kind, expected) in cases {
            let label = format!("{:?}", kind);
            let raws = raw_events(event(kind, &["/w/f.txt"]));
            assert_eq!(raws, vec![RawEvent::new("/w/f.txt", expected)], "{}", label);
        }
    }

    #[test]
    fn test_access_events_dropped() {
        let raws = raw_events(event(EventKind::Access(AccessKind::Read), &["/w/f.txt"]));
        assert!(raws.is_empty());
    }

    #[test]
    fn test_rename_both_splits_paths() {
        let raws = raw_events(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/old.txt", "/w/new.txt"],
        ));

        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].name, PathBuf::from("/w/old.txt"));
        assert_eq!(raws[1].name, PathBuf::from("/w/new.txt"));
        assert!(raws.iter().all(|r| r.flags == RawFlags::rename()));
    }

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(SourceItem::Fault("boom".into())).await.unwrap();
        drop(tx);

        assert_eq!(RawSource::recv(&mut rx).await, Some(SourceItem::Fault("boom".into())));
        assert_eq!(RawSource::recv(&mut rx).await, None);
    }
}
