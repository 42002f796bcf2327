//! Radio Nova live API
//!
//! ```json
//! {
//!   "currentTrack": {
//!     "title": "Title",
//!     "artist": "Artist",
//!     "diffusion_date": "2024-05-01T14:02:10+02:00",
//!     "duration": "03:30"
//!   }
//! }
//! ```
//!
//! The next poll is scheduled at the expected end of the current track.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::polling::SongProvider;
use crate::song::SongInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NovaTrack {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Start of the broadcast
    #[serde(default)]
    pub diffusion_date: String,
    /// Track length as `mm:ss`
    #[serde(default)]
    pub duration: String,
}

impl NovaTrack {
    /// `diffusion_date` as RFC 3339, or as a naive local date time.
    pub fn start(&self) -> Option<DateTime<Local>> {
        let raw = self.diffusion_date.trim();
        if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
            return Some(date.with_timezone(&Local));
        }

        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    }

    /// `duration` parsed as `mm:ss` (both below 60).
    pub fn length(&self) -> Option<Duration> {
        parse_minutes_seconds(&self.duration)
    }
}

/// Parse `mm:ss` into a duration.
pub fn parse_minutes_seconds(value: &str) -> Option<Duration> {
    let (minutes, seconds) = value.trim().split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds: u64 = seconds.trim().parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(Duration::from_secs(minutes * 60 + seconds))
}

/// Response of the Nova live endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaPayload {
    pub current_track: Option<NovaTrack>,
}

/// Scheduling targets the end of the current track.
pub struct NovaProvider;

impl SongProvider for NovaProvider {
    type Payload = NovaPayload;

    const NAME: &'static str = "nova";

    fn song(payload: &NovaPayload) -> Option<SongInfo> {
        payload
            .current_track
            .as_ref()
            .map(|track| SongInfo::new(track.artist.as_str(), track.title.as_str()))
    }

    fn next_delay(payload: &NovaPayload, now: DateTime<Local>, default: Duration) -> Duration {
        let Some(track) = payload.current_track.as_ref() else {
            return default;
        };
        let (Some(start), Some(length)) = (track.start(), track.length()) else {
            return default;
        };

        let elapsed = (now - start).to_std().unwrap_or(Duration::ZERO);
        debug!(
            start = %start.format("%H:%M:%S"),
            now = %now.format("%H:%M:%S"),
            elapsed_secs = elapsed.as_secs(),
            duration_secs = length.as_secs(),
            "Nova track timing"
        );

        match length.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => remaining,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const DEFAULT: Duration = Duration::from_millis(30_000);

    fn payload(diffusion_date: String, duration: &str) -> NovaPayload {
        NovaPayload {
            current_track: Some(NovaTrack {
                title: "Cherish the Day".to_string(),
                artist: "Sade".to_string(),
                diffusion_date,
                duration: duration.to_string(),
            }),
        }
    }

    #[test]
    fn test_delay_targets_end_of_track() {
        let now = Local::now();
        let start = now - TimeDelta::minutes(1);
        let payload = payload(start.to_rfc3339(), "03:30");

        let delay = NovaProvider::next_delay(&payload, now, DEFAULT).as_millis() as i64;
        assert!((delay - 150_000).abs() <= 1000, "delay was {delay}");
    }

    #[test]
    fn test_naive_local_date() {
        let now = Local::now();
        let start = now - TimeDelta::seconds(30);
        let payload = payload(start.format("%Y-%m-%d %H:%M:%S").to_string(), "01:00");

        let delay = NovaProvider::next_delay(&payload, now, DEFAULT).as_millis() as i64;
        assert!((delay - 30_000).abs() <= 1000, "delay was {delay}");
    }

    #[test]
    fn test_unparsable_duration_uses_default() {
        let payload = payload(Local::now().to_rfc3339(), "three minutes");
        assert_eq!(NovaProvider::next_delay(&payload, Local::now(), DEFAULT), DEFAULT);
    }

    #[test]
    fn test_finished_track_uses_default() {
        let now = Local::now();
        let payload = payload((now - TimeDelta::minutes(10)).to_rfc3339(), "03:30");
        assert_eq!(NovaProvider::next_delay(&payload, now, DEFAULT), DEFAULT);
    }

    #[test]
    fn test_future_start_counts_no_elapsed_time() {
        let now = Local::now();
        let payload = payload((now + TimeDelta::minutes(5)).to_rfc3339(), "02:00");
        assert_eq!(
            NovaProvider::next_delay(&payload, now, DEFAULT),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_song_and_decoding() {
        let payload: NovaPayload = serde_json::from_str(
            r#"{"currentTrack": {
                "title": "Teardrop",
                "artist": "Massive Attack",
                "diffusion_date": "2024-05-01T14:02:10+02:00",
                "duration": "05:29"
            }}"#,
        )
        .unwrap();
        assert_eq!(
            NovaProvider::song(&payload),
            Some(SongInfo::new("Massive Attack", "Teardrop"))
        );

        let empty: NovaPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(NovaProvider::song(&empty), None);
        assert_eq!(NovaProvider::next_delay(&empty, Local::now(), DEFAULT), DEFAULT);
    }

    #[test]
    fn test_parse_minutes_seconds() {
        assert_eq!(parse_minutes_seconds("03:30"), Some(Duration::from_secs(210)));
        assert_eq!(parse_minutes_seconds("00:59"), Some(Duration::from_secs(59)));
        assert_eq!(parse_minutes_seconds("61:00"), None);
        assert_eq!(parse_minutes_seconds("3"), None);
    }
}
