use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::editor::CursorHint;
use crate::error::{AppError, Result};

/// Ask the editor to open a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub path: PathBuf,
    pub cursor: CursorHint,
}

/// Signals emitted by the core for the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A file should be opened for editing.
    OpenFile(OpenRequest),
    /// The tree under this directory changed and should be re-rendered.
    TreeChanged(PathBuf),
    /// A path was removed from disk; tabs on or under it are stale.
    Removed(PathBuf),
    /// A buffer was written to this path.
    Saved(PathBuf),
}

/// Owns the event channel. Producers hold clones of the sender.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Get a sender clone for components that emit events.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (waits until available).
    #[allow(dead_code)]
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Terminal("Event channel closed".into()))
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let mut events = EventHandler::new();
        let tx = events.sender();
        tx.send(Event::TreeChanged(PathBuf::from("/proj"))).unwrap();
        tx.send(Event::Saved(PathBuf::from("/proj/a.md"))).unwrap();

        assert_eq!(
            events.next().await.unwrap(),
            Event::TreeChanged(PathBuf::from("/proj"))
        );
        assert_eq!(events.drain(), vec![Event::Saved(PathBuf::from("/proj/a.md"))]);
        assert!(events.drain().is_empty());
    }
}
