//! RAII owner of one engine stream and its callbacks
//!
//! A [`StreamHandle`] holds the engine stream id together with every callback
//! handed to the engine for that stream (the download callback and the
//! metadata syncs). Both are released in a single teardown, either through
//! [`StreamHandle::dispose`] or on drop, so the engine never keeps a callback
//! pointing at a dead owner.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, trace, warn};

use crate::engine::{
    Attribute, AudioEngine, ChannelActivity, ChannelInfo, DownloadCallback, FilePosition,
    MetaCallback, RawStream, StreamFlags, SyncId,
};
use crate::tags::{has_icy_metaint, TagInfo};

/// Callbacks kept alive for as long as the engine stream exists.
#[derive(Default)]
struct Pins {
    freed: bool,
    download: Option<DownloadCallback>,
    syncs: Vec<(SyncId, MetaCallback)>,
}

struct StreamCore {
    engine: Arc<dyn AudioEngine>,
    raw: RawStream,
    url: String,
    pins: Mutex<Pins>,
}

impl StreamCore {
    fn pins(&self) -> MutexGuard<'_, Pins> {
        // A poisoned lock only means a panic elsewhere; the pins are still valid.
        self.pins.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_freed(&self) -> bool {
        self.pins().freed
    }

    /// Free the engine stream, then drop the pinned callbacks.
    fn release(&self) -> bool {
        let mut pins = self.pins();
        if pins.freed {
            return false;
        }

        if !self.engine.free(self.raw) {
            warn!(stream = %self.raw, url = %self.url, "Engine refused to free stream");
        }
        pins.freed = true;

        let syncs = pins.syncs.len();
        pins.download = None;
        pins.syncs.clear();

        debug!(stream = %self.raw, url = %self.url, syncs, "Stream released");
        true
    }

    fn tag_info(&self) -> TagInfo {
        self.engine
            .tags_meta(self.raw)
            .map(|meta| TagInfo::from_meta(&meta))
            .unwrap_or_default()
    }

    fn register_meta_sync(&self, pins: &mut Pins, callback: MetaCallback) -> Option<SyncId> {
        let id = self.engine.set_meta_sync(self.raw, callback.clone())?;
        pins.syncs.push((id, callback));
        trace!(stream = %self.raw, sync = id.0, "Meta sync registered");
        Some(id)
    }
}

/// An open network audio stream.
pub struct StreamHandle {
    core: Arc<StreamCore>,
    has_metadata: bool,
}

impl StreamHandle {
    /// Open `url` on `engine`.
    ///
    /// Blocks on network I/O. Returns `None` when the engine cannot establish
    /// the stream. The response tags are inspected once: an `icy-metaint`
    /// tag marks the stream as carrying in-band metadata.
    pub fn open(
        engine: Arc<dyn AudioEngine>,
        url: &str,
        flags: StreamFlags,
        download: Option<DownloadCallback>,
    ) -> Option<Self> {
        let raw = engine.open_url(url, flags, download.clone())?;

        let core = Arc::new(StreamCore {
            engine,
            raw,
            url: url.to_string(),
            pins: Mutex::new(Pins {
                freed: false,
                download,
                syncs: Vec::new(),
            }),
        });

        let mut handle = Self {
            core,
            has_metadata: false,
        };
        handle.has_metadata = has_icy_metaint(&handle.icy_or_http_tags());

        debug!(
            stream = %raw,
            url,
            has_metadata = handle.has_metadata,
            "Stream opened"
        );
        Some(handle)
    }

    pub fn raw(&self) -> RawStream {
        self.core.raw
    }

    pub fn url(&self) -> &str {
        &self.core.url
    }

    /// The stream carries in-band (ICY) metadata.
    pub fn has_metadata(&self) -> bool {
        self.has_metadata
    }

    pub fn play(&self, restart: bool) -> bool {
        self.core.engine.play(self.core.raw, restart)
    }

    pub fn stop(&self) -> bool {
        self.core.engine.stop(self.core.raw)
    }

    pub fn pause(&self) -> bool {
        self.core.engine.pause(self.core.raw)
    }

    pub fn activity(&self) -> ChannelActivity {
        self.core.engine.is_active(self.core.raw)
    }

    pub fn file_position(&self, pos: FilePosition) -> Option<u64> {
        self.core.engine.file_position(self.core.raw, pos)
    }

    pub fn channel_info(&self) -> Option<ChannelInfo> {
        self.core.engine.channel_info(self.core.raw)
    }

    pub fn attribute(&self, attr: Attribute) -> Option<f32> {
        self.core.engine.attribute(self.core.raw, attr)
    }

    pub fn set_attribute(&self, attr: Attribute, value: f32) -> bool {
        self.core.engine.set_attribute(self.core.raw, attr, value)
    }

    /// Register a metadata sync. The callback stays pinned until disposal.
    pub fn set_meta_sync(&self, callback: MetaCallback) -> Option<SyncId> {
        let mut pins = self.core.pins();
        if pins.freed {
            return None;
        }
        self.core.register_meta_sync(&mut pins, callback)
    }

    pub fn tags_icy(&self) -> Option<Vec<String>> {
        self.core.engine.tags_icy(self.core.raw)
    }

    pub fn tags_http(&self) -> Option<Vec<String>> {
        self.core.engine.tags_http(self.core.raw)
    }

    /// ICY tags, falling back to HTTP tags, falling back to nothing.
    pub fn icy_or_http_tags(&self) -> Vec<String> {
        self.tags_icy()
            .or_else(|| self.tags_http())
            .unwrap_or_default()
    }

    /// One-shot snapshot of the current artist/title.
    pub fn tag_info(&self) -> TagInfo {
        self.core.tag_info()
    }

    /// Weak tag accessor for metadata listeners.
    ///
    /// It does not keep the stream alive and turns inert once the handle is
    /// disposed.
    pub fn tags(&self) -> StreamTags {
        StreamTags {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Release the stream and its callbacks now.
    pub fn dispose(self) {
        // Drop does the work; consuming self makes a second call impossible.
        drop(self);
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.core.release();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("raw", &self.core.raw)
            .field("url", &self.core.url)
            .field("has_metadata", &self.has_metadata)
            .finish()
    }
}

/// Non-owning view on a stream's tags.
#[derive(Clone)]
pub struct StreamTags {
    core: Weak<StreamCore>,
}

impl StreamTags {
    /// `false` once the owning handle has been disposed.
    pub fn is_alive(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| !core.is_freed())
    }

    /// Current artist/title, empty when the stream is gone.
    pub fn tag_info(&self) -> TagInfo {
        match self.core.upgrade() {
            Some(core) if !core.is_freed() => core.tag_info(),
            _ => TagInfo::default(),
        }
    }

    /// Register a metadata sync on the owning stream, if it is still alive.
    pub fn set_meta_sync(&self, callback: MetaCallback) -> Option<SyncId> {
        let core = self.core.upgrade()?;
        let mut pins = core.pins();
        if pins.freed {
            return None;
        }
        core.register_meta_sync(&mut pins, callback)
    }
}

impl fmt::Debug for StreamTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTags")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DownloadEvent;
    use crate::mock::MockEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "http://radio/live";

    fn engine() -> Arc<MockEngine> {
        Arc::new(MockEngine::new())
    }

    #[test]
    fn test_open_failure_returns_none() {
        let mock = Arc::new(MockEngine::new().fail_on("broken"));
        let handle =
            StreamHandle::open(mock.clone(), "http://broken/live", StreamFlags::NONE, None);
        assert!(handle.is_none());
        assert!(mock.live_streams().is_empty());
    }

    #[test]
    fn test_metaint_tag_marks_metadata() {
        let tags = ["icy-name:Test", "icy-metaint:16000"];
        let mock = Arc::new(MockEngine::new().with_icy_tags(&tags));
        let handle = StreamHandle::open(mock, URL, StreamFlags::NONE, None).unwrap();
        assert!(handle.has_metadata());

        let plain = StreamHandle::open(engine(), URL, StreamFlags::NONE, None).unwrap();
        assert!(!plain.has_metadata());
        assert!(plain.icy_or_http_tags().is_empty());
    }

    #[test]
    fn test_http_tags_fallback() {
        let mock = Arc::new(MockEngine::new().with_http_tags(&["content-type: audio/mpeg"]));
        let handle = StreamHandle::open(mock, URL, StreamFlags::NONE, None).unwrap();
        assert_eq!(handle.icy_or_http_tags(), vec!["content-type: audio/mpeg".to_string()]);
    }

    #[test]
    fn test_dispose_frees_stream_and_callbacks() {
        let mock = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = StreamHandle::open(mock.clone(), URL, StreamFlags::NONE, None).unwrap();
        let raw = handle.raw();

        handle
            .set_meta_sync(Arc::new(move |_meta: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert!(mock.emit_meta(raw, "StreamTitle='A - B';"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let tags = handle.tags();
        assert!(tags.is_alive());
        handle.dispose();

        assert_eq!(mock.freed_streams(), vec![raw]);
        assert!(!mock.emit_meta(raw, "StreamTitle='C - D';"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!tags.is_alive());
        assert_eq!(tags.tag_info(), TagInfo::default());
        assert!(tags.set_meta_sync(Arc::new(|_meta: &str| {})).is_none());
    }

    #[test]
    fn test_drop_releases_once() {
        let mock = engine();
        {
            let _handle = StreamHandle::open(mock.clone(), URL, StreamFlags::NONE, None).unwrap();
        }
        assert_eq!(mock.freed_streams().len(), 1);
        assert!(mock.live_streams().is_empty());
    }

    #[test]
    fn test_tag_info_snapshot() {
        let mock =
            Arc::new(MockEngine::new().with_meta("StreamTitle='Nina Simone - Feeling Good';"));
        let handle = StreamHandle::open(mock, URL, StreamFlags::NONE, None).unwrap();
        assert_eq!(handle.tag_info(), TagInfo::new("Nina Simone", "Feeling Good"));
        assert_eq!(handle.tags().tag_info(), TagInfo::new("Nina Simone", "Feeling Good"));
    }

    #[test]
    fn test_download_callback_and_positions() {
        let mock = engine();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let download: DownloadCallback =
            Arc::new(move |event: DownloadEvent| sink.lock().unwrap().push(event));

        let handle =
            StreamHandle::open(mock.clone(), URL, StreamFlags::STATUS, Some(download)).unwrap();
        assert!(handle.play(true));
        mock.feed(handle.raw(), 2048);

        assert_eq!(handle.file_position(FilePosition::Download), Some(2048));
        assert_eq!(handle.file_position(FilePosition::Current), Some(2048));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                DownloadEvent::Status("HTTP/1.1 200 OK".to_string()),
                DownloadEvent::Data(2048)
            ]
        );

        assert!(handle.set_attribute(Attribute::Volume, 0.25));
        assert_eq!(handle.attribute(Attribute::Volume), Some(0.25));
        assert!(handle.channel_info().is_some());
    }
}
