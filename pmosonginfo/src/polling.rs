//! Song updates from a JSON now-playing API
//!
//! A [`PollingSource`] runs one tokio task that loops request → publish →
//! sleep. The sleep duration comes from the payload itself (see
//! [`SongProvider::next_delay`]), so requests never overlap. Any failure
//! (network, status, decoding) is logged and ends the loop until the next
//! `start()`.

use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Local};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::song::{SongInfo, SongInfoSink};
use crate::source::MetadataSource;

/// Default delay between two polls when the payload gives no hint (30 s)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;

/// Default timeout for now-playing requests (30 s)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent for now-playing requests
pub const DEFAULT_USER_AGENT: &str = "WebRadio/0.1 (pmosonginfo)";

/// Polling settings shared by every polling source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingOptions {
    /// Delay used when the provider cannot compute one.
    pub default_interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PollingOptions {
    /// Build the shared HTTP client for these options.
    pub fn build_client(&self) -> Result<Client> {
        Ok(Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()?)
    }
}

/// Payload format and scheduling rules of one now-playing API.
pub trait SongProvider: Send + Sync + 'static {
    type Payload: DeserializeOwned + Send + 'static;

    /// Source name used in logs and by the factory.
    const NAME: &'static str;

    /// The song announced by the payload, if any.
    fn song(payload: &Self::Payload) -> Option<SongInfo>;

    /// Delay before the next request.
    fn next_delay(payload: &Self::Payload, now: DateTime<Local>, default: Duration) -> Duration;
}

/// Fetch and decode one payload.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use pmosonginfo::{polling::fetch_payload, FipProvider, PollingOptions, SongProvider};
/// # tokio_test::block_on(async {
/// let options = PollingOptions::default();
/// let client = options.build_client()?;
/// let payload = fetch_payload::<FipProvider>(
///     &client,
///     "https://api.radiofrance.fr/livemeta/fip/live",
///     Duration::from_secs(10),
/// )
/// .await?;
/// println!("{:?}", FipProvider::song(&payload));
/// # Ok::<(), pmosonginfo::Error>(())
/// # });
/// ```
pub async fn fetch_payload<P: SongProvider>(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<P::Payload> {
    let response = client.get(url).timeout(timeout).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Polls `url` with the rules of provider `P`.
pub struct PollingSource<P: SongProvider> {
    url: String,
    client: Client,
    runtime: Handle,
    options: PollingOptions,
    sink: SongInfoSink,
    task: Option<(CancellationToken, JoinHandle<()>)>,
    _provider: PhantomData<fn() -> P>,
}

impl<P: SongProvider> PollingSource<P> {
    pub fn new(
        url: impl Into<String>,
        client: Client,
        runtime: Handle,
        options: PollingOptions,
        sink: SongInfoSink,
    ) -> Self {
        Self {
            url: url.into(),
            client,
            runtime,
            options,
            sink,
            task: None,
            _provider: PhantomData,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `true` while the polling task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    fn cancel(&mut self) {
        if let Some((token, handle)) = self.task.take() {
            token.cancel();
            handle.abort();
            debug!(source = P::NAME, url = %self.url, "Polling cancelled");
        }
    }
}

async fn poll_loop<P: SongProvider>(
    url: String,
    client: Client,
    options: PollingOptions,
    sink: SongInfoSink,
    token: CancellationToken,
) {
    loop {
        let fetched = tokio::select! {
            _ = token.cancelled() => break,
            fetched = fetch_payload::<P>(&client, &url, options.timeout) => fetched,
        };

        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) if e.is_network() => {
                error!(
                    source = P::NAME,
                    url = %url,
                    error = %e,
                    "Error downloading radio metadata"
                );
                break;
            }
            Err(e) => {
                error!(
                    source = P::NAME,
                    url = %url,
                    error = %e,
                    "Error deserializing radio metadata"
                );
                break;
            }
        };

        if token.is_cancelled() {
            break;
        }

        if let Some(song) = P::song(&payload) {
            info!(source = P::NAME, artist = %song.artist, title = %song.title, "New song info");
            sink(song);
        }

        let delay = P::next_delay(&payload, Local::now(), options.default_interval);
        info!(source = P::NAME, delay_ms = delay.as_millis() as u64, "Delay to refresh");

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(source = P::NAME, url = %url, "Polling loop ended");
}

impl<P: SongProvider> MetadataSource for PollingSource<P> {
    fn start(&mut self) {
        self.cancel();

        let token = CancellationToken::new();
        let handle = self.runtime.spawn(poll_loop::<P>(
            self.url.clone(),
            self.client.clone(),
            self.options.clone(),
            self.sink.clone(),
            token.clone(),
        ));

        info!(source = P::NAME, url = %self.url, "Polling started");
        self.task = Some((token, handle));
    }

    fn dispose(&mut self) {
        self.cancel();
    }

    fn name(&self) -> &'static str {
        P::NAME
    }
}

impl<P: SongProvider> Drop for PollingSource<P> {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!(source = P::NAME, url = %self.url, "Polling source dropped while running");
        }
        self.cancel();
    }
}
