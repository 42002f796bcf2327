//! # pmostream - Network audio streams for WebRadio
//!
//! This crate wraps a native network audio engine behind the [`AudioEngine`]
//! trait and exposes a safe, RAII [`StreamHandle`] on top of it.
//!
//! ## Features
//!
//! - **Stream handle**: one engine stream plus its callbacks, released together
//! - **ICY tags**: `StreamTitle='Artist - Title';` parsing into [`TagInfo`]
//! - **ICY engine**: HTTP transport with in-band metadata ([`IcyEngine`])
//! - **Mock engine**: scriptable double behind the `testing` feature
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pmostream::{Attribute, IcyEngine, StreamFlags, StreamHandle};
//!
//! let engine = Arc::new(IcyEngine::new("WebRadio/0.1", Duration::from_secs(10)));
//! let url = "http://icecast.radiofrance.fr/fip-hifi.aac";
//! if let Some(stream) = StreamHandle::open(engine, url, StreamFlags::STATUS, None) {
//!     stream.set_attribute(Attribute::Volume, 0.5);
//!     stream.play(true);
//!     println!("Now: {:?}", stream.tag_info());
//!     stream.dispose();
//! }
//! ```

pub mod engine;
pub mod error;
pub mod handle;
pub mod icy;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod tags;

pub use engine::{
    Attribute, AudioEngine, ChannelActivity, ChannelInfo, ChannelType, DownloadCallback,
    DownloadEvent, FilePosition, MetaCallback, RawStream, StreamFlags, SyncId,
};
pub use error::{Error, Result};
pub use handle::{StreamHandle, StreamTags};
pub use icy::{AudioSink, IcyChunk, IcyDemuxer, IcyEngine};
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockEngine, OpenGate};
pub use tags::TagInfo;
