//! Shared output stream

use crate::event::WatchEvent;
use tokio::sync::mpsc;
use tracing::warn;

/// Producer handle for the output stream
///
/// Cloned into every directory task and tracker. Sends wait while the
/// stream is full so a slow consumer throttles producers. Once the
/// consumer has gone away, events are dropped with a warning.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<WatchEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<WatchEvent>) -> Self {
        Self { tx }
    }

    /// Push an event, waiting for room if needed
    pub async fn send(&self, event: WatchEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event).await {
            warn!("Event stream closed, dropping event for {}", event.path.display());
        }
    }
}

/// Create the bounded output stream
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<WatchEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}
