//! Native audio engine boundary
//!
//! The engine is the black box that actually opens network streams, buffers
//! and plays them. It is addressed through opaque [`RawStream`] ids, the way
//! native audio libraries hand out integer handles. Everything above this
//! trait ([`crate::StreamHandle`], the metadata sources, the player) only
//! relies on the primitives listed here.

use std::fmt;
use std::sync::Arc;

/// Opaque id of a stream owned by an [`AudioEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawStream(pub u64);

impl fmt::Display for RawStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Id of a metadata sync registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncId(pub u64);

/// Flags passed when opening a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFlags {
    /// Forward the server status line and headers to the download callback.
    pub status: bool,
}

impl StreamFlags {
    pub const NONE: StreamFlags = StreamFlags { status: false };
    pub const STATUS: StreamFlags = StreamFlags { status: true };
}

/// Which byte counter to read with [`AudioEngine::file_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePosition {
    /// Bytes handed to the output so far.
    Current,
    /// Bytes downloaded from the network so far.
    Download,
}

/// Channel attributes that can be read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// 0.0 (silent) ..= 1.0 (full)
    Volume,
    /// -1.0 (left) ..= 1.0 (right)
    Pan,
}

/// Codec family of an opened stream, as far as the engine can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelType {
    Mp3,
    Aac,
    Ogg,
    Flac,
    Other(String),
}

impl ChannelType {
    /// Guess the channel type from a `Content-Type` header value.
    pub fn from_content_type(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => ChannelType::Mp3,
            "audio/aac" | "audio/aacp" | "audio/x-aac" | "audio/mp4" => ChannelType::Aac,
            "audio/ogg" | "application/ogg" | "audio/vorbis" | "audio/opus" => ChannelType::Ogg,
            "audio/flac" | "audio/x-flac" => ChannelType::Flac,
            _ => ChannelType::Other(mime),
        }
    }
}

/// Static information about an opened channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub ctype: ChannelType,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bitrate_kbps: Option<u32>,
}

/// Playback activity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelActivity {
    Stopped,
    Playing,
    Paused,
    /// Playing but starved of data.
    Stalled,
}

/// Event delivered to the download callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Server status line or header (only with [`StreamFlags::STATUS`]).
    Status(String),
    /// A chunk of this many bytes was received.
    Data(usize),
}

/// Download progress callback, pinned by the stream handle for its lifetime.
pub type DownloadCallback = Arc<dyn Fn(DownloadEvent) + Send + Sync>;

/// Metadata sync callback, receives the raw in-band metadata block.
pub type MetaCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Primitives exposed by a native network audio engine.
///
/// Every operation on an unknown or freed stream fails softly (`false` /
/// `None`); engines never panic on bad ids. Callbacks registered through
/// [`AudioEngine::open_url`] and [`AudioEngine::set_meta_sync`] are dropped by
/// [`AudioEngine::free`] and are never invoked once `free` has returned.
/// Callbacks must not call back into the engine.
pub trait AudioEngine: Send + Sync {
    /// Open a network stream. Blocks on network I/O. `None` on any failure.
    fn open_url(
        &self,
        url: &str,
        flags: StreamFlags,
        download: Option<DownloadCallback>,
    ) -> Option<RawStream>;

    /// Release the stream and every callback attached to it.
    fn free(&self, stream: RawStream) -> bool;

    fn play(&self, stream: RawStream, restart: bool) -> bool;

    fn stop(&self, stream: RawStream) -> bool;

    fn pause(&self, stream: RawStream) -> bool;

    fn is_active(&self, stream: RawStream) -> ChannelActivity;

    fn file_position(&self, stream: RawStream, pos: FilePosition) -> Option<u64>;

    fn channel_info(&self, stream: RawStream) -> Option<ChannelInfo>;

    fn attribute(&self, stream: RawStream, attr: Attribute) -> Option<f32>;

    fn set_attribute(&self, stream: RawStream, attr: Attribute, value: f32) -> bool;

    /// ICY response tags (`icy-name:...`), `None` when the server sent none.
    fn tags_icy(&self, stream: RawStream) -> Option<Vec<String>>;

    /// Plain HTTP response headers (`Name: value`).
    fn tags_http(&self, stream: RawStream) -> Option<Vec<String>>;

    /// Last in-band metadata block (`StreamTitle='...';`), if any arrived.
    fn tags_meta(&self, stream: RawStream) -> Option<String>;

    /// Register a callback fired on each in-band metadata block.
    fn set_meta_sync(&self, stream: RawStream, callback: MetaCallback) -> Option<SyncId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_from_content_type() {
        assert_eq!(ChannelType::from_content_type("audio/mpeg"), ChannelType::Mp3);
        assert_eq!(
            ChannelType::from_content_type("audio/aacp; charset=binary"),
            ChannelType::Aac
        );
        assert_eq!(ChannelType::from_content_type("Application/OGG"), ChannelType::Ogg);
        assert_eq!(
            ChannelType::from_content_type("text/html"),
            ChannelType::Other("text/html".to_string())
        );
    }
}
