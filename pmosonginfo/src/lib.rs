//! # pmosonginfo - "Now playing" sources for WebRadio
//!
//! Two interchangeable strategies produce artist/title updates for the
//! station being played:
//!
//! - [`EmbeddedTagSource`] listens to the ICY metadata of the stream itself
//! - [`PollingSource`] polls a JSON now-playing API on an adaptive schedule
//!   ([`FipProvider`], [`NovaProvider`])
//!
//! [`SourceFactory`] picks the polling strategy for a station API URL.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pmosonginfo::{PollingOptions, SongInfo, SourceContext, SourceFactory};
//!
//! #[tokio::main]
//! async fn main() -> pmosonginfo::Result<()> {
//!     let runtime = tokio::runtime::Handle::current();
//!     let context = SourceContext::new(runtime, PollingOptions::default())?;
//!     let factory = SourceFactory::with_defaults(context);
//!
//!     let sink = Arc::new(|song: SongInfo| println!("Now: {}", song));
//!     let api = "https://api.radiofrance.fr/livemeta/fip/live";
//!     if let Some(mut source) = factory.get_downloader(api, sink) {
//!         source.start();
//!         tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!         source.dispose();
//!     }
//!     Ok(())
//! }
//! ```

pub mod embedded;
pub mod error;
pub mod factory;
pub mod fip;
pub mod nova;
pub mod polling;
pub mod song;
pub mod source;

pub use embedded::EmbeddedTagSource;
pub use error::{Error, Result};
pub use factory::{SourceContext, SourceFactory};
pub use fip::{FipPayload, FipProvider};
pub use nova::{NovaPayload, NovaProvider};
pub use polling::{PollingOptions, PollingSource, SongProvider};
pub use song::{SongInfo, SongInfoSink};
pub use source::MetadataSource;
