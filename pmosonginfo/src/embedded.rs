//! Song updates from in-band stream metadata

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pmostream::{StreamTags, TagInfo};
use tracing::{debug, info};

use crate::song::{SongInfo, SongInfoSink};
use crate::source::MetadataSource;

/// Listens to the ICY metadata events of one stream.
///
/// `start()` publishes the current tag snapshot and registers a metadata sync
/// on the stream. Each event is re-parsed and announced only when artist or
/// title differ from the last known value. The registration itself lives as
/// long as the stream; `dispose()` only silences it.
pub struct EmbeddedTagSource {
    tags: StreamTags,
    sink: SongInfoSink,
    active: Arc<AtomicBool>,
    last: Arc<Mutex<TagInfo>>,
    registered: bool,
}

impl EmbeddedTagSource {
    pub const NAME: &'static str = "icy";

    pub fn new(tags: StreamTags, sink: SongInfoSink) -> Self {
        Self {
            tags,
            sink,
            active: Arc::new(AtomicBool::new(false)),
            last: Arc::new(Mutex::new(TagInfo::default())),
            registered: false,
        }
    }

    fn register(&mut self) {
        let active = self.active.clone();
        let last = self.last.clone();
        let sink = self.sink.clone();

        let sync = self.tags.set_meta_sync(Arc::new(move |meta: &str| {
            if !active.load(Ordering::Acquire) {
                return;
            }

            let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
            if last.update_from_meta(meta) {
                info!(artist = %last.artist, title = %last.title, "New song info from stream tags");
                sink(SongInfo::from(last.clone()));
            }
        }));

        match sync {
            Some(id) => {
                debug!(sync = id.0, "Embedded tag listener registered");
                self.registered = true;
            }
            None => debug!("Stream gone, embedded tag listener not registered"),
        }
    }
}

impl MetadataSource for EmbeddedTagSource {
    fn start(&mut self) {
        let snapshot = self.tags.tag_info();
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        self.active.store(true, Ordering::Release);

        (self.sink)(SongInfo::from(snapshot));

        if !self.registered {
            self.register();
        }
    }

    fn dispose(&mut self) {
        self.active.store(false, Ordering::Release);
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl Drop for EmbeddedTagSource {
    fn drop(&mut self) {
        self.dispose();
    }
}
