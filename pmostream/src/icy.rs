//! HTTP/ICY transport engine
//!
//! [`IcyEngine`] implements [`AudioEngine`] for Icecast and Shoutcast
//! streams served over HTTP. Each stream runs on a dedicated reader thread
//! which performs the request with `Icy-MetaData: 1`, splits the body into
//! audio bytes and in-band metadata blocks, counts downloaded bytes and fires
//! the registered callbacks. Audio bytes are handed to an optional
//! [`AudioSink`] while the stream is playing; decoding is not done here.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::{debug, info, trace, warn};
use ureq::Agent;

use crate::engine::{
    Attribute, AudioEngine, ChannelActivity, ChannelInfo, ChannelType, DownloadCallback,
    DownloadEvent, FilePosition, MetaCallback, RawStream, StreamFlags, SyncId,
};
use crate::error::{Error, Result};
use crate::tags::find_tag;

const READ_CHUNK: usize = 16 * 1024;

/// Receives the raw (still encoded) audio bytes of playing streams.
pub trait AudioSink: Send + Sync {
    fn write(&self, stream: RawStream, data: &[u8]);
}

// ============================================================================
// Demultiplexer
// ============================================================================

/// One piece of a demultiplexed ICY body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcyChunk {
    /// This many audio bytes were written to the caller's buffer.
    Audio(usize),
    /// A non-empty metadata block, NUL padding removed.
    Metadata(String),
}

/// Splits an ICY body into audio and metadata.
///
/// Every `metaint` audio bytes the server inserts one length byte `L`
/// followed by `L * 16` bytes of metadata. Without `metaint` the whole body
/// is audio.
pub struct IcyDemuxer<R> {
    inner: R,
    metaint: Option<usize>,
    until_meta: usize,
}

impl<R: Read> IcyDemuxer<R> {
    pub fn new(inner: R, metaint: Option<usize>) -> Self {
        let metaint = metaint.filter(|interval| *interval > 0);
        Self {
            inner,
            metaint,
            until_meta: metaint.unwrap_or(0),
        }
    }

    /// Read the next chunk. `Ok(None)` at end of body.
    ///
    /// Empty metadata blocks (length byte 0) are skipped.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<IcyChunk>> {
        let Some(interval) = self.metaint else {
            let n = self.inner.read(buf)?;
            return Ok((n > 0).then_some(IcyChunk::Audio(n)));
        };

        loop {
            if self.until_meta > 0 {
                let want = buf.len().min(self.until_meta);
                let n = self.inner.read(&mut buf[..want])?;
                if n == 0 {
                    return Ok(None);
                }
                self.until_meta -= n;
                return Ok(Some(IcyChunk::Audio(n)));
            }

            let mut len = [0u8; 1];
            if self.inner.read(&mut len)? == 0 {
                return Ok(None);
            }
            self.until_meta = interval;

            let size = usize::from(len[0]) * 16;
            if size == 0 {
                continue;
            }

            let mut block = vec![0u8; size];
            self.inner.read_exact(&mut block)?;
            let text = String::from_utf8_lossy(&block)
                .trim_end_matches('\0')
                .to_string();
            if !text.is_empty() {
                return Ok(Some(IcyChunk::Metadata(text)));
            }
        }
    }
}

// ============================================================================
// Per-stream state
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Control {
    activity: ChannelActivity,
    volume: f32,
    pan: f32,
}

#[derive(Default)]
struct Callbacks {
    freed: bool,
    download: Option<DownloadCallback>,
    syncs: Vec<(SyncId, MetaCallback)>,
}

struct IcyStream {
    raw: RawStream,
    url: String,
    http_tags: Vec<String>,
    icy_tags: Vec<String>,
    info: ChannelInfo,
    downloaded: AtomicU64,
    played: AtomicU64,
    control: Mutex<Control>,
    last_meta: Mutex<Option<String>>,
    callbacks: Mutex<Callbacks>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl IcyStream {
    fn control(&self) -> MutexGuard<'_, Control> {
        lock(&self.control)
    }

    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        lock(&self.callbacks)
    }

    /// Returns `false` once the stream is freed.
    fn notify_download(&self, event: DownloadEvent) -> bool {
        let callbacks = self.callbacks();
        if callbacks.freed {
            return false;
        }
        if let Some(download) = &callbacks.download {
            download(event);
        }
        true
    }

    /// Returns `false` once the stream is freed.
    fn notify_meta(&self, meta: &str) -> bool {
        *lock(&self.last_meta) = Some(meta.to_string());

        let callbacks = self.callbacks();
        if callbacks.freed {
            return false;
        }
        trace!(stream = %self.raw, syncs = callbacks.syncs.len(), meta, "ICY metadata");
        for (_, callback) in &callbacks.syncs {
            callback(meta);
        }
        true
    }
}

/// Channel information from the response headers.
fn channel_info(http_tags: &[String]) -> ChannelInfo {
    let ctype = find_tag(http_tags, "content-type")
        .map(ChannelType::from_content_type)
        .unwrap_or_else(|| ChannelType::Other(String::new()));

    // "icy-br: 128" or "icy-br: 128,128" on some Shoutcast servers
    let mut bitrate_kbps = find_tag(http_tags, "icy-br")
        .and_then(|br| br.split(',').next())
        .and_then(|br| br.trim().parse().ok());

    let mut sample_rate = None;
    let mut channels = None;

    // "ice-audio-info: ice-samplerate=44100;ice-bitrate=128;ice-channels=2"
    if let Some(audio_info) = find_tag(http_tags, "ice-audio-info") {
        for field in audio_info.split(';') {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "ice-samplerate" | "samplerate" => sample_rate = value.parse().ok(),
                "ice-channels" | "channels" => channels = value.parse().ok(),
                "ice-bitrate" | "bitrate" if bitrate_kbps.is_none() => {
                    bitrate_kbps = value.parse().ok()
                }
                _ => {}
            }
        }
    }

    ChannelInfo {
        ctype,
        sample_rate,
        channels,
        bitrate_kbps,
    }
}

// ============================================================================
// Engine
// ============================================================================

/// [`AudioEngine`] over HTTP with ICY metadata.
///
/// Only `http://` and `https://` URLs are supported. Servers must answer with
/// an HTTP status line (Icecast, Shoutcast v2).
pub struct IcyEngine {
    agent: Agent,
    user_agent: String,
    sink: Option<Arc<dyn AudioSink>>,
    next_id: AtomicU64,
    next_sync: AtomicU64,
    streams: Mutex<HashMap<RawStream, Arc<IcyStream>>>,
}

impl IcyEngine {
    /// Create an engine. `timeout` bounds connection and response headers,
    /// not the (endless) body.
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .build();

        Self {
            agent: config.into(),
            user_agent: user_agent.into(),
            sink: None,
            next_id: AtomicU64::new(1),
            next_sync: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Route audio bytes of playing streams to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn stream(&self, raw: RawStream) -> Option<Arc<IcyStream>> {
        lock(&self.streams).get(&raw).cloned()
    }

    fn connect(
        &self,
        url: &str,
        flags: StreamFlags,
        download: Option<DownloadCallback>,
    ) -> Result<RawStream> {
        let lower = url.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(Error::UnsupportedUrl(url.to_string()));
        }

        let raw = RawStream(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (ready_tx, ready_rx) = bounded::<Result<Arc<IcyStream>>>(1);

        let reader = StreamReader {
            agent: self.agent.clone(),
            user_agent: self.user_agent.clone(),
            sink: self.sink.clone(),
            raw,
            url: url.to_string(),
            flags,
            download,
        };

        thread::Builder::new()
            .name(format!("icy-{}", raw.0))
            .spawn(move || reader.run(|ready| ready_tx.send(ready).is_ok()))?;

        let stream = ready_rx
            .recv()
            .map_err(|_| Error::other("stream reader exited before connecting"))??;

        lock(&self.streams).insert(raw, stream);
        Ok(raw)
    }
}

impl AudioEngine for IcyEngine {
    fn open_url(
        &self,
        url: &str,
        flags: StreamFlags,
        download: Option<DownloadCallback>,
    ) -> Option<RawStream> {
        match self.connect(url, flags, download) {
            Ok(raw) => {
                info!(stream = %raw, url, "ICY stream connected");
                Some(raw)
            }
            Err(e) => {
                warn!(url, error = %e, "Failed to open ICY stream");
                None
            }
        }
    }

    fn free(&self, stream: RawStream) -> bool {
        let Some(entry) = lock(&self.streams).remove(&stream) else {
            return false;
        };

        // Waits for a callback in flight on the reader thread.
        let mut callbacks = entry.callbacks();
        callbacks.freed = true;
        callbacks.download = None;
        callbacks.syncs.clear();
        drop(callbacks);

        entry.control().activity = ChannelActivity::Stopped;
        debug!(stream = %stream, url = %entry.url, "ICY stream freed");
        true
    }

    fn play(&self, stream: RawStream, restart: bool) -> bool {
        let Some(entry) = self.stream(stream) else {
            return false;
        };
        if restart {
            entry.played.store(0, Ordering::Relaxed);
        }
        entry.control().activity = ChannelActivity::Playing;
        true
    }

    fn stop(&self, stream: RawStream) -> bool {
        let Some(entry) = self.stream(stream) else {
            return false;
        };
        entry.control().activity = ChannelActivity::Stopped;
        true
    }

    fn pause(&self, stream: RawStream) -> bool {
        let Some(entry) = self.stream(stream) else {
            return false;
        };
        let mut control = entry.control();
        if control.activity != ChannelActivity::Playing {
            return false;
        }
        control.activity = ChannelActivity::Paused;
        true
    }

    fn is_active(&self, stream: RawStream) -> ChannelActivity {
        self.stream(stream)
            .map(|entry| entry.control().activity)
            .unwrap_or(ChannelActivity::Stopped)
    }

    fn file_position(&self, stream: RawStream, pos: FilePosition) -> Option<u64> {
        let entry = self.stream(stream)?;
        Some(match pos {
            FilePosition::Current => entry.played.load(Ordering::Relaxed),
            FilePosition::Download => entry.downloaded.load(Ordering::Relaxed),
        })
    }

    fn channel_info(&self, stream: RawStream) -> Option<ChannelInfo> {
        self.stream(stream).map(|entry| entry.info.clone())
    }

    fn attribute(&self, stream: RawStream, attr: Attribute) -> Option<f32> {
        let entry = self.stream(stream)?;
        let control = entry.control();
        Some(match attr {
            Attribute::Volume => control.volume,
            Attribute::Pan => control.pan,
        })
    }

    fn set_attribute(&self, stream: RawStream, attr: Attribute, value: f32) -> bool {
        let Some(entry) = self.stream(stream) else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        let mut control = entry.control();
        match attr {
            Attribute::Volume => control.volume = value.clamp(0.0, 1.0),
            Attribute::Pan => control.pan = value.clamp(-1.0, 1.0),
        }
        true
    }

    fn tags_icy(&self, stream: RawStream) -> Option<Vec<String>> {
        let entry = self.stream(stream)?;
        (!entry.icy_tags.is_empty()).then(|| entry.icy_tags.clone())
    }

    fn tags_http(&self, stream: RawStream) -> Option<Vec<String>> {
        let entry = self.stream(stream)?;
        (!entry.http_tags.is_empty()).then(|| entry.http_tags.clone())
    }

    fn tags_meta(&self, stream: RawStream) -> Option<String> {
        let entry = self.stream(stream)?;
        let meta = lock(&entry.last_meta).clone();
        meta
    }

    fn set_meta_sync(&self, stream: RawStream, callback: MetaCallback) -> Option<SyncId> {
        let entry = self.stream(stream)?;
        let mut callbacks = entry.callbacks();
        if callbacks.freed {
            return None;
        }
        let id = SyncId(self.next_sync.fetch_add(1, Ordering::Relaxed));
        callbacks.syncs.push((id, callback));
        Some(id)
    }
}

// ============================================================================
// Reader thread
// ============================================================================

struct StreamReader {
    agent: Agent,
    user_agent: String,
    sink: Option<Arc<dyn AudioSink>>,
    raw: RawStream,
    url: String,
    flags: StreamFlags,
    download: Option<DownloadCallback>,
}

impl StreamReader {
    /// Connect, report through `ready`, then pump the body until freed or
    /// end of stream. `ready` returns `false` when nobody waits any more.
    fn run(self, ready: impl FnOnce(Result<Arc<IcyStream>>) -> bool) {
        let response = match self
            .agent
            .get(&self.url)
            .header("Icy-MetaData", "1")
            .header("User-Agent", &self.user_agent)
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                ready(Err(Error::Status(code)));
                return;
            }
            Err(e) => {
                ready(Err(e.into()));
                return;
            }
        };

        let (parts, body) = response.into_parts();
        let status_line = format!("{:?} {}", parts.version, parts.status);

        let mut http_tags = Vec::new();
        let mut icy_tags = Vec::new();
        for (name, value) in parts.headers.iter() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let name = name.as_str();
            if name.starts_with("icy-") {
                icy_tags.push(format!("{}:{}", name, value));
            }
            http_tags.push(format!("{}: {}", name, value));
        }

        let metaint = find_tag(&icy_tags, "icy-metaint").and_then(|v| v.parse::<usize>().ok());

        let stream = Arc::new(IcyStream {
            raw: self.raw,
            url: self.url.clone(),
            info: channel_info(&http_tags),
            http_tags,
            icy_tags,
            downloaded: AtomicU64::new(0),
            played: AtomicU64::new(0),
            control: Mutex::new(Control {
                activity: ChannelActivity::Stopped,
                volume: 1.0,
                pan: 0.0,
            }),
            last_meta: Mutex::new(None),
            callbacks: Mutex::new(Callbacks {
                freed: false,
                download: self.download.clone(),
                syncs: Vec::new(),
            }),
        });

        if self.flags.status {
            stream.notify_download(DownloadEvent::Status(status_line));
            for header in &stream.http_tags {
                stream.notify_download(DownloadEvent::Status(header.clone()));
            }
        }

        if !ready(Ok(stream.clone())) {
            return;
        }

        debug!(stream = %self.raw, metaint = ?metaint, "ICY reader started");
        self.pump(&stream, IcyDemuxer::new(body.into_reader(), metaint));
    }

    fn pump<R: Read>(&self, stream: &IcyStream, mut demuxer: IcyDemuxer<R>) {
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            match demuxer.next_chunk(&mut buf) {
                Ok(Some(IcyChunk::Audio(n))) => {
                    stream.downloaded.fetch_add(n as u64, Ordering::Relaxed);
                    if !stream.notify_download(DownloadEvent::Data(n)) {
                        break;
                    }
                    if stream.control().activity == ChannelActivity::Playing {
                        if let Some(sink) = &self.sink {
                            sink.write(self.raw, &buf[..n]);
                        }
                        stream.played.fetch_add(n as u64, Ordering::Relaxed);
                    }
                }
                Ok(Some(IcyChunk::Metadata(meta))) => {
                    if !stream.notify_meta(&meta) {
                        break;
                    }
                }
                Ok(None) => {
                    info!(stream = %self.raw, url = %self.url, "ICY stream ended");
                    stream.control().activity = ChannelActivity::Stopped;
                    break;
                }
                Err(e) => {
                    warn!(
                        stream = %self.raw,
                        url = %self.url,
                        error = %e,
                        "ICY stream read failed"
                    );
                    stream.control().activity = ChannelActivity::Stopped;
                    break;
                }
            }
        }

        debug!(stream = %self.raw, "ICY reader stopped");
    }
}
