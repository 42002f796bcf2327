//! # pmowebradio - Web radio player
//!
//! Playback state machine of the WebRadio player: a persisted list of
//! stations, one live stream at a time, and a "now playing" value kept in
//! sync from the stream's ICY tags or from a station's JSON API.
//!
//! ## Features
//!
//! - **Stations**: JSON persisted list with validation ([`StationList`])
//! - **Playback**: buffering, stop, prev/next, volume ([`PlaybackController`])
//! - **Now playing**: embedded tags or polled APIs, de-duplicated
//! - **Progress**: elapsed time and downloaded bytes shown on the playing entry
//! - **State**: selection and playing flag restored at startup ([`AppState`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pmoconfig::get_config;
//! use pmostream::IcyEngine;
//! use pmowebradio::{AppState, PlaybackController, PlayerEvent};
//!
//! fn main() -> pmowebradio::Result<()> {
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     let config = get_config();
//!     let engine = Arc::new(IcyEngine::new("WebRadio/0.1", Duration::from_secs(10)));
//!
//!     let handle = runtime.handle().clone();
//!     let mut player = PlaybackController::from_config(&config, engine, handle)?;
//!     let events = player.subscribe();
//!     player.restore(AppState::new(Some(0), true));
//!
//!     loop {
//!         player.wait_and_process(Duration::from_millis(100));
//!         for event in events.try_iter() {
//!             if let PlayerEvent::Song(song) = event {
//!                 println!("{}", song);
//!             }
//!         }
//!     }
//! }
//! ```

pub mod config_ext;
pub mod controller;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod state;
pub mod station;

pub use config_ext::WebRadioConfigExt;
pub use controller::{PlaybackController, PlaybackState, PlayerOptions, IDLE_TITLE};
pub use error::{Error, Result};
pub use events::PlayerEvent;
pub use format::{format_bytes, format_elapsed, progress_text, BUFFERING_TEXT};
pub use logging::init_logging;
pub use state::AppState;
pub use station::{JsonStationStore, Station, StationList, StationStore};
