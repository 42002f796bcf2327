//! Playback controller
//!
//! The controller is the state machine behind the player UI. It owns at most
//! one [`StreamHandle`] and one [`MetadataSource`], coordinates buffering, the
//! progress ticker and the volume, and publishes one reconciled "now playing"
//! value.
//!
//! All state lives on the thread that owns the controller. Work that blocks
//! (stream opens) or waits (ticker, polling) runs on the tokio runtime and
//! reports back through a channel of messages tagged with the
//! playback session that produced them. The owner drains that channel with
//! [`PlaybackController::process_pending`] or
//! [`PlaybackController::wait_and_process`]; messages from an older session
//! are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use pmoconfig::Config;
use pmosonginfo::{
    EmbeddedTagSource, MetadataSource, SongInfo, SongInfoSink, SourceContext, SourceFactory,
};
use pmostream::{
    Attribute, AudioEngine, DownloadCallback, DownloadEvent, FilePosition, RawStream, StreamFlags,
    StreamHandle,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::config_ext::WebRadioConfigExt;
use crate::error::{Error, Result};
use crate::events::{PlayerEvent, PlayerEventBus};
use crate::format::{progress_text, BUFFERING_TEXT};
use crate::state::AppState;
use crate::station::{Station, StationList};

/// Title shown when nothing plays
pub const IDLE_TITLE: &str = "WebRadio";

/// Player settings
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    /// Initial volume (0.0 ..= 1.0)
    pub volume: f32,
    /// Log the server status lines received while opening a stream
    pub show_download_info: bool,
    /// Log the ICY/HTTP tags of a new stream
    pub show_icy_tags: bool,
    /// Refresh period of the progress text
    pub ticker_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            volume: 1.0,
            show_download_info: true,
            show_icy_tags: true,
            ticker_interval: Duration::from_millis(100),
        }
    }
}

/// Visible playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// A stream open is in flight
    Buffering,
    Playing,
}

/// Worker results handed to the owning thread.
pub(crate) enum PlayerMessage {
    StreamOpened {
        session: u64,
        stream: Option<StreamHandle>,
    },
    Song {
        session: u64,
        song: SongInfo,
    },
    Tick {
        session: u64,
    },
}

struct PendingOpen {
    session: u64,
    index: usize,
    /// Stopped while buffering; the handle is disposed on arrival.
    cancelled: bool,
    /// Play requested after the stop, started once the open resolves.
    queued: Option<usize>,
}

struct ActivePlayback {
    session: u64,
    index: usize,
    stream: StreamHandle,
    source: Box<dyn MetadataSource>,
    ticker: JoinHandle<()>,
    tick_queued: Arc<AtomicBool>,
    started: Instant,
}

/// Web radio playback state machine.
pub struct PlaybackController {
    engine: Arc<dyn AudioEngine>,
    stations: StationList,
    factory: SourceFactory,
    options: PlayerOptions,
    runtime: Handle,

    tx: Sender<PlayerMessage>,
    rx: Receiver<PlayerMessage>,
    events: PlayerEventBus,

    last_session: u64,
    selected: Option<usize>,
    playing_index: Option<usize>,
    pending: Option<PendingOpen>,
    active: Option<ActivePlayback>,
    song: SongInfo,
    volume: f32,
}

impl PlaybackController {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        stations: StationList,
        factory: SourceFactory,
        options: PlayerOptions,
        runtime: Handle,
    ) -> Self {
        let (tx, rx) = unbounded();
        let volume = options.volume.clamp(0.0, 1.0);
        Self {
            engine,
            stations,
            factory,
            options,
            runtime,
            tx,
            rx,
            events: PlayerEventBus::new(),
            last_session: 0,
            selected: None,
            playing_index: None,
            pending: None,
            active: None,
            song: SongInfo::empty(),
            volume,
        }
    }

    /// Build a controller from the configuration: station file, player and
    /// polling options, default metadata sources.
    pub fn from_config(
        config: &Config,
        engine: Arc<dyn AudioEngine>,
        runtime: Handle,
    ) -> Result<Self> {
        let stations = StationList::load(Box::new(config.station_store()?))?;
        let context = SourceContext::new(runtime.clone(), config.get_polling_options()?)?;
        let factory = SourceFactory::with_defaults(context);
        let options = config.get_player_options()?;

        info!(stations = stations.len(), "Player ready");
        Ok(Self::new(engine, stations, factory, options, runtime))
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        if self.active.is_some() {
            PlaybackState::Playing
        } else if self
            .pending
            .as_ref()
            .is_some_and(|p| !p.cancelled || p.queued.is_some())
        {
            PlaybackState::Buffering
        } else {
            PlaybackState::Idle
        }
    }

    /// An open is in flight, including one already cancelled by
    /// [`stop_item`](Self::stop_item). No second open starts meanwhile.
    pub fn is_buffering(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stations(&self) -> &StationList {
        &self.stations
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_station(&self) -> Option<&Station> {
        self.selected.and_then(|i| self.stations.get(i))
    }

    pub fn playing_index(&self) -> Option<usize> {
        self.playing_index
    }

    pub fn song(&self) -> &SongInfo {
        &self.song
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Name of the metadata source of the current session.
    pub fn active_source_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|a| a.source.name())
    }

    pub fn current_stream(&self) -> Option<RawStream> {
        self.active.as_ref().map(|a| a.stream.raw())
    }

    /// Window title: idle title, station name, or `artist / title`.
    pub fn window_title(&self) -> String {
        match self.playing_station() {
            None => IDLE_TITLE.to_string(),
            Some(station) if self.song.is_empty() => station.name.clone(),
            Some(_) => format!("{} / {}", self.song.artist, self.song.title),
        }
    }

    /// Tray tooltip: idle title, or station name with the song on a second line.
    pub fn tray_tooltip(&self) -> String {
        match self.playing_station() {
            None => IDLE_TITLE.to_string(),
            Some(station) if self.song.is_empty() => station.name.clone(),
            Some(station) => format!(
                "{}\n{} / {}",
                station.name, self.song.artist, self.song.title
            ),
        }
    }

    fn playing_station(&self) -> Option<&Station> {
        self.playing_index.and_then(|i| self.stations.get(i))
    }

    // ========================================================================
    // Playback commands
    // ========================================================================

    /// Start playing the station at `index`.
    ///
    /// Ignored while buffering. When the open in flight was cancelled by
    /// [`stop_item`](Self::stop_item), the request is queued and starts as
    /// soon as that open resolves. Otherwise stops the current playback and
    /// opens the new stream on a worker; the result is applied by
    /// [`process_pending`](Self::process_pending).
    pub fn play_item(&mut self, index: usize) -> Result<()> {
        info!(index, "PlayItem");

        let url = self
            .stations
            .get(index)
            .map(|station| station.url.clone())
            .ok_or(Error::IndexOutOfRange {
                index,
                len: self.stations.len(),
            })?;

        if let Some(pending) = self.pending.as_mut() {
            if !pending.cancelled {
                debug!(index, "Open in flight, play ignored");
                return Ok(());
            }

            debug!(index, session = pending.session, "Play queued behind cancelled open");
            if let Some(previous) = pending.queued.replace(index).filter(|&p| p != index) {
                self.set_append(previous, "");
            }
            self.set_append(index, BUFFERING_TEXT);
            self.set_playing_index(Some(index));
            return Ok(());
        }

        self.stop_item();

        self.last_session += 1;
        let session = self.last_session;

        self.set_append(index, BUFFERING_TEXT);
        self.pending = Some(PendingOpen {
            session,
            index,
            cancelled: false,
            queued: None,
        });
        self.events.broadcast(PlayerEvent::Buffering(true));
        self.set_playing_index(Some(index));

        let engine = self.engine.clone();
        let options = self.options.clone();
        let tx = self.tx.clone();
        self.runtime.spawn_blocking(move || {
            let stream = open_stream(engine, &url, &options);
            // If the controller is gone the handle is dropped with the message.
            let _ = tx.send(PlayerMessage::StreamOpened { session, stream });
        });

        Ok(())
    }

    /// Play the selected station.
    pub fn play_selected(&mut self) -> Result<()> {
        let index = self.selected.ok_or(Error::NoSelection)?;
        self.play_item(index)
    }

    /// Stop playback and tear down the stream, ticker and metadata source.
    ///
    /// While buffering, the visible state is reset at once and the stream
    /// that eventually opens is disposed.
    pub fn stop_item(&mut self) {
        let mut queued = None;
        if let Some(pending) = self.pending.as_mut() {
            queued = pending.queued.take();
            if !pending.cancelled {
                pending.cancelled = true;
                let index = pending.index;
                info!(index, session = pending.session, "Stop while buffering");

                self.set_append(index, "");
                self.set_song(SongInfo::empty());
                self.set_playing_index(None);
            }
        }
        if let Some(index) = queued {
            info!(index, "Queued play cancelled");
            self.set_append(index, "");
            self.set_playing_index(None);
        }

        let Some(active) = self.active.take() else {
            return;
        };

        info!(index = active.index, session = active.session, "StopItem");

        let ActivePlayback {
            index,
            stream,
            mut source,
            ticker,
            ..
        } = active;

        stream.dispose();
        ticker.abort();
        source.dispose();

        self.set_append(index, "");
        self.set_song(SongInfo::empty());
        self.set_playing_index(None);
    }

    /// Stop when playing, else play the selection.
    pub fn play_pause_item(&mut self) -> Result<()> {
        if self.state() == PlaybackState::Playing {
            self.stop_item();
            Ok(())
        } else {
            self.play_selected()
        }
    }

    /// Select and play the previous station; no-op at the first one.
    pub fn play_prev_item(&mut self) {
        let Some(index) = self.selected.filter(|i| *i > 0) else {
            return;
        };
        self.select_and_play(index - 1);
    }

    /// Select and play the next station; no-op at the last one.
    pub fn play_next_item(&mut self) {
        let Some(index) = self.selected.filter(|i| i + 1 < self.stations.len()) else {
            return;
        };
        self.select_and_play(index + 1);
    }

    fn select_and_play(&mut self, index: usize) {
        self.set_selected(Some(index));
        if let Err(e) = self.play_item(index) {
            warn!(index, error = %e, "Could not play station");
        }
    }

    /// Change the selection (`None` clears it).
    pub fn select(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            let len = self.stations.len();
            if index >= len {
                return Err(Error::IndexOutOfRange { index, len });
            }
        }
        self.set_selected(index);
        Ok(())
    }

    /// Set the volume, applied at once to a live stream.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            self.volume
        };
        if volume == self.volume {
            return;
        }

        self.volume = volume;
        self.events.broadcast(PlayerEvent::Volume(volume));

        if let Some(active) = &self.active {
            if !active.stream.set_attribute(Attribute::Volume, volume) {
                warn!(volume, "Could not set stream volume");
            }
        }
    }

    // ========================================================================
    // Station editing
    // ========================================================================

    /// Append a valid station and select it.
    pub fn add_station(&mut self, station: Station) -> Result<usize> {
        let index = self.stations.push(station)?;
        info!(index, "Station added");
        self.events.broadcast(PlayerEvent::Stations);
        self.set_selected(Some(index));
        Ok(index)
    }

    /// Replace the selected station, keeping the selection.
    pub fn edit_station(&mut self, mut station: Station) -> Result<()> {
        let index = self.selected.ok_or(Error::NoSelection)?;
        if let Some(current) = self.stations.get(index) {
            station.append = current.append.clone();
        }
        self.stations.replace(index, station)?;
        info!(index, "Station edited");
        self.events.broadcast(PlayerEvent::Stations);
        self.events.broadcast(PlayerEvent::Selection(Some(index)));
        Ok(())
    }

    /// Remove the selected station, stopping it first if it plays.
    pub fn remove_station(&mut self) -> Result<Station> {
        let index = self.selected.ok_or(Error::NoSelection)?;
        if index >= self.stations.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.stations.len(),
            });
        }

        let pending_here = self
            .pending
            .as_ref()
            .is_some_and(|p| (p.index == index && !p.cancelled) || p.queued == Some(index));
        if self.playing_index == Some(index) || pending_here {
            self.stop_item();
        }

        let removed = self.stations.remove(index)?;
        info!(index, name = %removed.name, "Station removed");

        // Later stations moved up by one
        let shift = |i: &mut usize| {
            if *i > index {
                *i -= 1;
            }
        };
        if let Some(pending) = self.pending.as_mut() {
            shift(&mut pending.index);
            if let Some(queued) = pending.queued.as_mut() {
                shift(queued);
            }
        }
        if let Some(active) = self.active.as_mut() {
            shift(&mut active.index);
        }
        if let Some(mut playing) = self.playing_index {
            shift(&mut playing);
            self.playing_index = Some(playing);
        }

        self.events.broadcast(PlayerEvent::Stations);
        let selection = match self.stations.len() {
            0 => None,
            len => Some(index.min(len - 1)),
        };
        self.set_selected(selection);

        Ok(removed)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Apply a saved snapshot: selection, then playback if it was playing.
    pub fn restore(&mut self, state: AppState) {
        let Some(index) = state.selection().filter(|i| *i < self.stations.len()) else {
            debug!(?state, "Saved selection not restorable");
            return;
        };

        self.set_selected(Some(index));
        if state.is_playing {
            if let Err(e) = self.play_item(index) {
                warn!(index, error = %e, "Could not resume playback");
            }
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.selected, self.playing_index.is_some())
    }

    /// Stop playback and return the snapshot to persist.
    pub fn shutdown(&mut self) -> AppState {
        info!("Closing !");
        let state = self.app_state();
        self.stop_item();
        state
    }

    // ========================================================================
    // Worker messages
    // ========================================================================

    /// Apply every queued worker message. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a message, then drain the queue.
    pub fn wait_and_process(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_message(message);
                1 + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn handle_message(&mut self, message: PlayerMessage) {
        match message {
            PlayerMessage::StreamOpened { session, stream } => {
                self.on_stream_opened(session, stream)
            }
            PlayerMessage::Song { session, song } => {
                if self.is_active_session(session) {
                    self.set_song(song);
                } else {
                    trace!(session, "Stale song info dropped");
                }
            }
            PlayerMessage::Tick { session } => self.on_tick(session),
        }
    }

    fn is_active_session(&self, session: u64) -> bool {
        self.active.as_ref().is_some_and(|a| a.session == session)
    }

    fn on_stream_opened(&mut self, session: u64, stream: Option<StreamHandle>) {
        let pending = match self.pending.take() {
            Some(pending) if pending.session == session => pending,
            other => {
                self.pending = other;
                if let Some(stream) = stream {
                    debug!(session, "Stale stream disposed");
                    stream.dispose();
                }
                return;
            }
        };

        self.events.broadcast(PlayerEvent::Buffering(false));

        if pending.cancelled {
            if let Some(stream) = stream {
                debug!(session, "Stream opened after stop, disposed");
                stream.dispose();
            }
            if let Some(index) = pending.queued {
                if let Err(e) = self.play_item(index) {
                    warn!(index, error = %e, "Could not start queued play");
                }
            }
            return;
        }

        let index = pending.index;
        let Some(stream) = stream else {
            error!(index, "Failed to create stream !");
            self.set_append(index, "");
            self.set_playing_index(None);
            return;
        };

        let api = self
            .stations
            .get(index)
            .map(|station| station.api.clone())
            .unwrap_or_default();

        let sink = self.song_sink(session);
        let mut source = self.metadata_source(&api, &stream, sink);
        source.start();

        if !stream.set_attribute(Attribute::Volume, self.volume) {
            warn!(volume = self.volume, "Could not set stream volume");
        }
        if !stream.play(true) {
            warn!(index, "Engine refused to play stream");
        }

        let tick_queued = Arc::new(AtomicBool::new(false));
        let ticker = self.spawn_ticker(session, tick_queued.clone());

        info!(index, session, source = source.name(), "Playing");
        self.active = Some(ActivePlayback {
            session,
            index,
            stream,
            source,
            ticker,
            tick_queued,
            started: Instant::now(),
        });
    }

    fn metadata_source(
        &self,
        api: &str,
        stream: &StreamHandle,
        sink: SongInfoSink,
    ) -> Box<dyn MetadataSource> {
        if !api.is_empty() {
            if let Some(source) = self.factory.get_downloader(api, sink.clone()) {
                return source;
            }
            warn!(api, "Could not find a suitable downloader");
        }
        Box::new(EmbeddedTagSource::new(stream.tags(), sink))
    }

    fn song_sink(&self, session: u64) -> SongInfoSink {
        let tx = self.tx.clone();
        Arc::new(move |song: SongInfo| {
            let _ = tx.send(PlayerMessage::Song { session, song });
        })
    }

    fn spawn_ticker(&self, session: u64, tick_queued: Arc<AtomicBool>) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let period = self.options.ticker_interval;

        self.runtime.spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticks.tick().await;

            loop {
                ticks.tick().await;
                // One tick in the queue at a time
                if tick_queued.swap(true, Ordering::AcqRel) {
                    continue;
                }
                if tx.send(PlayerMessage::Tick { session }).is_err() {
                    break;
                }
            }
        })
    }

    fn on_tick(&mut self, session: u64) {
        let Some(active) = self.active.as_ref().filter(|a| a.session == session) else {
            return;
        };
        active.tick_queued.store(false, Ordering::Release);

        let downloaded = active
            .stream
            .file_position(FilePosition::Download)
            .unwrap_or(0);
        let text = progress_text(active.started.elapsed(), downloaded);
        let index = active.index;
        self.set_append(index, text);
    }

    // ========================================================================
    // State writes
    // ========================================================================

    fn set_song(&mut self, song: SongInfo) {
        if song == self.song {
            return;
        }
        info!(artist = %song.artist, title = %song.title, "New song info");
        self.song = song.clone();
        self.events.broadcast(PlayerEvent::Song(song));
    }

    fn set_playing_index(&mut self, index: Option<usize>) {
        if index == self.playing_index {
            return;
        }
        self.playing_index = index;
        self.events.broadcast(PlayerEvent::PlayingIndex(index));
    }

    fn set_selected(&mut self, index: Option<usize>) {
        if index == self.selected {
            return;
        }
        self.selected = index;
        self.events.broadcast(PlayerEvent::Selection(index));
    }

    fn set_append(&mut self, index: usize, text: impl Into<String>) {
        let text = text.into();
        if self.stations.set_append(index, text.clone()) {
            self.events
                .broadcast(PlayerEvent::DisplayText { index, text });
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop_item();
    }
}

/// Open the stream and log what the server told about it.
fn open_stream(
    engine: Arc<dyn AudioEngine>,
    url: &str,
    options: &PlayerOptions,
) -> Option<StreamHandle> {
    debug!(url, "Opening stream");

    let show_download_info = options.show_download_info;
    let download: DownloadCallback = Arc::new(move |event: DownloadEvent| {
        if let DownloadEvent::Status(info) = event {
            if show_download_info {
                debug!(info = %info, "Download info");
            }
        }
    });

    let Some(stream) = StreamHandle::open(engine, url, StreamFlags::STATUS, Some(download)) else {
        error!(url, "Could not create stream");
        return None;
    };

    if let Some(info) = stream.channel_info() {
        debug!(
            ctype = ?info.ctype,
            sample_rate = ?info.sample_rate,
            channels = ?info.channels,
            bitrate_kbps = ?info.bitrate_kbps,
            "Channel info"
        );
    }

    if options.show_icy_tags {
        for tag in stream.icy_or_http_tags() {
            debug!(tag = %tag, "ICY tag");
        }
    }

    Some(stream)
}
