//! Observer notifications.
//!
//! Every UI observer gets its own channel; the processing loop broadcasts
//! derived, display-ready data to all of them. A subscriber that drops its
//! receiver is pruned on the next broadcast.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::display::SessionView;

/// Something an observer may want to redraw or announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Title, time or seek state of a player changed.
    SessionChanged(SessionView),
    /// The active player moved. `name` is the humanized name.
    ActiveChanged { slot: usize, name: String },
    /// Advisory engine error, already labelled `Player <i>:<message>`.
    Error { slot: usize, message: String },
    /// Decoded video size of a player is known.
    MediaSize { slot: usize, width: u32, height: u32 },
    /// A command was refused before touching any session.
    Rejected { slot: usize, reason: String },
    /// Playback is impossible for this process. Raised at most once.
    Fatal(String),
}

#[derive(Clone, Default)]
pub struct ViewerEventBus {
    subscribers: Arc<Mutex<Vec<Sender<ViewerEvent>>>>,
}

impl ViewerEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ViewerEvent> {
        let (tx, rx) = unbounded::<ViewerEvent>();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn broadcast(&self, event: ViewerEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives() {
        let bus = ViewerEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.broadcast(ViewerEvent::Fatal("boom".into()));
        assert_eq!(a.try_recv().unwrap(), ViewerEvent::Fatal("boom".into()));
        assert_eq!(b.try_recv().unwrap(), ViewerEvent::Fatal("boom".into()));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = ViewerEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        bus.broadcast(ViewerEvent::ActiveChanged {
            slot: 1,
            name: "Player 1".into(),
        });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }
}
