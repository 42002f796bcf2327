//! Polling sources against a local fake API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use pmosonginfo::{
    FipProvider, MetadataSource, PollingOptions, PollingSource, SongInfo, SongInfoSink,
    SourceContext, SourceFactory,
};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

async fn fip_live(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    let n = hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "now": {"firstLine": format!("Track {n}"), "secondLine": "Artist"},
        "next": {"firstLine": "Next", "secondLine": "Someone"},
        "delayToRefresh": 50
    }))
}

async fn nova_live(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "currentTrack": {
            "title": "Unfinished Sympathy",
            "artist": "Massive Attack",
            "diffusion_date": "not a date",
            "duration": "05:08"
        }
    }))
}

async fn missing(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn garbage(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "<html>not json</html>"
}

/// Serve the fake API and return its base URL and hit counter.
async fn serve() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/livemeta/fip/live", get(fip_live))
        .route("/radios/nova/live", get(nova_live))
        .route("/missing/fip/live", get(missing))
        .route("/garbage/fip/live", get(garbage))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

fn channel_sink() -> (SongInfoSink, mpsc::UnboundedReceiver<SongInfo>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: SongInfoSink = Arc::new(move |song: SongInfo| {
        let _ = tx.send(song);
    });
    (sink, rx)
}

fn options() -> PollingOptions {
    PollingOptions {
        default_interval: Duration::from_millis(30_000),
        timeout: Duration::from_secs(5),
        ..PollingOptions::default()
    }
}

fn fip_source(url: String, sink: SongInfoSink) -> PollingSource<FipProvider> {
    let options = options();
    let client = options.build_client().unwrap();
    PollingSource::new(url, client, Handle::current(), options, sink)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<SongInfo>) -> SongInfo {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no song info in time")
        .expect("sink dropped")
}

#[tokio::test]
async fn test_fip_polls_on_server_delay() {
    let (base, hits) = serve().await;
    let (sink, mut rx) = channel_sink();

    let mut source = fip_source(format!("{base}/livemeta/fip/live"), sink);
    source.start();

    assert_eq!(recv(&mut rx).await, SongInfo::new("Artist", "Track 0"));
    assert_eq!(recv(&mut rx).await, SongInfo::new("Artist", "Track 1"));
    assert!(source.is_running());

    source.dispose();
    assert!(!source.is_running());

    let after_dispose = hits.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(hits.load(Ordering::SeqCst) <= after_dispose + 1);
}

#[tokio::test]
async fn test_error_status_stops_polling() {
    let (base, hits) = serve().await;
    let (sink, mut rx) = channel_sink();

    let mut source = fip_source(format!("{base}/missing/fip/live"), sink);
    source.start();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
    assert!(!source.is_running());

    // A manual start tries again
    source.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_decode_failure_stops_polling() {
    let (base, hits) = serve().await;
    let (sink, mut rx) = channel_sink();

    let mut source = fip_source(format!("{base}/garbage/fip/live"), sink);
    source.start();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_factory_builds_nova_source() {
    let (base, hits) = serve().await;
    let (sink, mut rx) = channel_sink();

    let context = SourceContext::new(Handle::current(), options()).unwrap();
    let factory = SourceFactory::with_defaults(context);

    let mut source = factory
        .get_downloader(&format!("{base}/radios/nova/live"), sink)
        .expect("nova source");
    assert_eq!(source.name(), "nova");

    source.start();
    assert_eq!(
        recv(&mut rx).await,
        SongInfo::new("Massive Attack", "Unfinished Sympathy")
    );

    // Unparsable start date: next poll after the 30 s default
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    source.dispose();
}

#[tokio::test]
async fn test_restart_cancels_previous_schedule() {
    let (base, _hits) = serve().await;
    let (sink, mut rx) = channel_sink();

    let mut source = fip_source(format!("{base}/livemeta/fip/live"), sink);
    source.start();
    recv(&mut rx).await;
    source.start();
    recv(&mut rx).await;
    source.dispose();

    tokio::time::sleep(Duration::from_millis(200)).await;
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
}
