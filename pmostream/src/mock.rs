//! Scriptable in-memory engine
//!
//! Used by the tests of this crate and, through the `testing` feature, by the
//! crates built on top of it. Opens can be made to fail or to block until a
//! gate is released; metadata events are injected by hand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::engine::{
    Attribute, AudioEngine, ChannelActivity, ChannelInfo, ChannelType, DownloadCallback,
    DownloadEvent, FilePosition, MetaCallback, RawStream, StreamFlags, SyncId,
};

struct MockStream {
    url: String,
    activity: ChannelActivity,
    volume: f32,
    pan: f32,
    downloaded: u64,
    played: u64,
    meta: Option<String>,
    download: Option<DownloadCallback>,
    syncs: Vec<(SyncId, MetaCallback)>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    next_sync: u64,
    fail_on: Vec<String>,
    icy_tags: Option<Vec<String>>,
    http_tags: Option<Vec<String>>,
    initial_meta: Option<String>,
    opened_urls: Vec<String>,
    streams: HashMap<RawStream, MockStream>,
    freed: Vec<RawStream>,
    last: Option<RawStream>,
}

/// Releases opens blocked by [`MockEngine::hold_opens`] when dropped.
pub struct OpenGate {
    _tx: Sender<()>,
}

impl OpenGate {
    pub fn release(self) {}
}

/// [`AudioEngine`] double.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
    gate: Mutex<Option<Receiver<()>>>,
    open_count: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens of URLs containing `fragment` fail.
    pub fn fail_on(self, fragment: &str) -> Self {
        self.state().fail_on.push(fragment.to_string());
        self
    }

    /// ICY tags reported by every stream opened from now on.
    pub fn with_icy_tags(self, tags: &[&str]) -> Self {
        self.state().icy_tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// HTTP tags reported by every stream opened from now on.
    pub fn with_http_tags(self, tags: &[&str]) -> Self {
        self.state().http_tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Metadata block already present when a stream opens.
    pub fn with_meta(self, meta: &str) -> Self {
        self.state().initial_meta = Some(meta.to_string());
        self
    }

    /// Block every open until the returned gate is dropped.
    pub fn hold_opens(&self) -> OpenGate {
        let (tx, rx) = bounded(0);
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(rx);
        OpenGate { _tx: tx }
    }

    /// Number of `open_url` calls, counted on entry.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state().opened_urls.clone()
    }

    /// Most recently opened stream.
    pub fn last_stream(&self) -> Option<RawStream> {
        self.state().last
    }

    pub fn live_streams(&self) -> Vec<RawStream> {
        let mut live: Vec<_> = self.state().streams.keys().copied().collect();
        live.sort_by_key(|raw| raw.0);
        live
    }

    pub fn freed_streams(&self) -> Vec<RawStream> {
        self.state().freed.clone()
    }

    /// Registered callbacks still held for `stream`.
    pub fn sync_count(&self, stream: RawStream) -> usize {
        self.state()
            .streams
            .get(&stream)
            .map(|s| s.syncs.len())
            .unwrap_or(0)
    }

    pub fn is_playing(&self, stream: RawStream) -> bool {
        self.state()
            .streams
            .get(&stream)
            .is_some_and(|s| s.activity == ChannelActivity::Playing)
    }

    pub fn volume_of(&self, stream: RawStream) -> Option<f32> {
        self.state().streams.get(&stream).map(|s| s.volume)
    }

    /// Simulate `bytes` more downloaded bytes (fires the download callback).
    pub fn feed(&self, stream: RawStream, bytes: u64) -> bool {
        let mut state = self.state();
        let Some(entry) = state.streams.get_mut(&stream) else {
            return false;
        };
        entry.downloaded += bytes;
        if entry.activity == ChannelActivity::Playing {
            entry.played += bytes;
        }
        if let Some(download) = &entry.download {
            download(DownloadEvent::Data(bytes as usize));
        }
        true
    }

    /// Deliver an in-band metadata block to the stream's syncs.
    pub fn emit_meta(&self, stream: RawStream, meta: &str) -> bool {
        let mut state = self.state();
        let Some(entry) = state.streams.get_mut(&stream) else {
            return false;
        };
        entry.meta = Some(meta.to_string());
        for (_, callback) in &entry.syncs {
            callback(meta);
        }
        true
    }

    fn wait_gate(&self) {
        let gate = self
            .gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(rx) = gate {
            // Returns once the gate's sender is dropped.
            let _ = rx.recv();
        }
    }
}

impl AudioEngine for MockEngine {
    fn open_url(
        &self,
        url: &str,
        flags: StreamFlags,
        download: Option<DownloadCallback>,
    ) -> Option<RawStream> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.wait_gate();

        let mut state = self.state();
        state.opened_urls.push(url.to_string());
        if state.fail_on.iter().any(|fragment| url.contains(fragment.as_str())) {
            debug!(url, "Mock open failure");
            return None;
        }

        state.next_id += 1;
        let raw = RawStream(state.next_id);
        if flags.status {
            if let Some(download) = &download {
                download(DownloadEvent::Status("HTTP/1.1 200 OK".to_string()));
            }
        }

        let meta = state.initial_meta.clone();
        state.streams.insert(
            raw,
            MockStream {
                url: url.to_string(),
                activity: ChannelActivity::Stopped,
                volume: 1.0,
                pan: 0.0,
                downloaded: 0,
                played: 0,
                meta,
                download,
                syncs: Vec::new(),
            },
        );
        state.last = Some(raw);
        Some(raw)
    }

    fn free(&self, stream: RawStream) -> bool {
        let mut state = self.state();
        match state.streams.remove(&stream) {
            Some(entry) => {
                debug!(stream = %stream, url = %entry.url, "Mock stream freed");
                state.freed.push(stream);
                true
            }
            None => false,
        }
    }

    fn play(&self, stream: RawStream, restart: bool) -> bool {
        let mut state = self.state();
        let Some(entry) = state.streams.get_mut(&stream) else {
            return false;
        };
        if restart {
            entry.played = 0;
        }
        entry.activity = ChannelActivity::Playing;
        true
    }

    fn stop(&self, stream: RawStream) -> bool {
        let mut state = self.state();
        let Some(entry) = state.streams.get_mut(&stream) else {
            return false;
        };
        entry.activity = ChannelActivity::Stopped;
        true
    }

    fn pause(&self, stream: RawStream) -> bool {
        let mut state = self.state();
        match state.streams.get_mut(&stream) {
            Some(entry) if entry.activity == ChannelActivity::Playing => {
                entry.activity = ChannelActivity::Paused;
                true
            }
            _ => false,
        }
    }

    fn is_active(&self, stream: RawStream) -> ChannelActivity {
        self.state()
            .streams
            .get(&stream)
            .map(|s| s.activity)
            .unwrap_or(ChannelActivity::Stopped)
    }

    fn file_position(&self, stream: RawStream, pos: FilePosition) -> Option<u64> {
        let state = self.state();
        let entry = state.streams.get(&stream)?;
        Some(match pos {
            FilePosition::Current => entry.played,
            FilePosition::Download => entry.downloaded,
        })
    }

    fn channel_info(&self, stream: RawStream) -> Option<ChannelInfo> {
        let state = self.state();
        state.streams.get(&stream)?;
        Some(ChannelInfo {
            ctype: ChannelType::Mp3,
            sample_rate: Some(44100),
            channels: Some(2),
            bitrate_kbps: Some(128),
        })
    }

    fn attribute(&self, stream: RawStream, attr: Attribute) -> Option<f32> {
        let state = self.state();
        let entry = state.streams.get(&stream)?;
        Some(match attr {
            Attribute::Volume => entry.volume,
            Attribute::Pan => entry.pan,
        })
    }

    fn set_attribute(&self, stream: RawStream, attr: Attribute, value: f32) -> bool {
        let mut state = self.state();
        let Some(entry) = state.streams.get_mut(&stream) else {
            return false;
        };
        match attr {
            Attribute::Volume => entry.volume = value,
            Attribute::Pan => entry.pan = value,
        }
        true
    }

    fn tags_icy(&self, stream: RawStream) -> Option<Vec<String>> {
        let state = self.state();
        state.streams.get(&stream)?;
        state.icy_tags.clone()
    }

    fn tags_http(&self, stream: RawStream) -> Option<Vec<String>> {
        let state = self.state();
        state.streams.get(&stream)?;
        state.http_tags.clone()
    }

    fn tags_meta(&self, stream: RawStream) -> Option<String> {
        let state = self.state();
        state.streams.get(&stream)?.meta.clone()
    }

    fn set_meta_sync(&self, stream: RawStream, callback: MetaCallback) -> Option<SyncId> {
        let mut state = self.state();
        state.next_sync += 1;
        let id = SyncId(state.next_sync);
        let entry = state.streams.get_mut(&stream)?;
        entry.syncs.push((id, callback));
        Some(id)
    }
}
