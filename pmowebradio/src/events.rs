use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};
use pmosonginfo::SongInfo;

/// Change notifications of the playback controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Buffering(bool),
    PlayingIndex(Option<usize>),
    Song(SongInfo),
    /// Display text of a station changed (`append`)
    DisplayText { index: usize, text: String },
    Selection(Option<usize>),
    Volume(f32),
    /// Station list changed (add, edit, remove)
    Stations,
}

#[derive(Clone, Default)]
pub(crate) struct PlayerEventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl PlayerEventBus {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded::<PlayerEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn broadcast(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
