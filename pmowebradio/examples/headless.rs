//! Example: play a station without a UI and print the song changes
//!
//! Run with: cargo run -p pmowebradio --example headless
//! Or pick a station and a duration: cargo run -p pmowebradio --example headless -- 2 120

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pmoconfig::get_config;
use pmostream::IcyEngine;
use pmowebradio::{init_logging, AppState, PlaybackController, PlayerEvent};

fn main() -> anyhow::Result<()> {
    let config = get_config();
    init_logging(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let engine = Arc::new(IcyEngine::new(
        config.get_user_agent()?,
        Duration::from_secs(config.get_http_timeout_secs()?),
    ));

    let mut player = PlaybackController::from_config(&config, engine, runtime.handle().clone())?;
    let events = player.subscribe();

    let state_file = config.get_state_file()?;
    let index: Option<usize> = env::args().nth(1).and_then(|arg| arg.parse().ok());
    let seconds: u64 = env::args()
        .nth(2)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(60);

    match index {
        Some(index) => {
            player.select(Some(index))?;
            player.play_item(index)?;
        }
        None => {
            let saved = AppState::load(&state_file).unwrap_or(AppState::new(Some(0), true));
            player.restore(saved);
        }
    }

    println!("Stations:");
    for (i, station) in player.stations().iter().enumerate() {
        println!("  {}: {} ({})", i, station.name, station.url);
    }

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        player.wait_and_process(Duration::from_millis(100));

        for event in events.try_iter() {
            match event {
                PlayerEvent::Song(song) if !song.is_empty() => println!("Now: {}", song),
                PlayerEvent::PlayingIndex(None) => println!("Stopped"),
                PlayerEvent::Buffering(true) => println!("Buffering..."),
                _ => {}
            }
        }
    }

    println!("{}", player.window_title());
    let state = player.shutdown();
    state.save(&state_file)?;

    Ok(())
}
