//! FIP live API
//!
//! ```json
//! {
//!   "now":  { "firstLine": "Title", "secondLine": "Artist" },
//!   "next": { "firstLine": "...",   "secondLine": "..." },
//!   "delayToRefresh": 15000
//! }
//! ```
//!
//! Newer responses carry `{ "title": ..., "id": ..., "path": ... }` objects
//! instead of plain strings for the lines; both forms are accepted.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::polling::SongProvider;
use crate::song::SongInfo;

/// A line of text, plain or with link information
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Line {
    Text(String),
    Rich {
        /// Text content
        title: Option<String>,
        /// UUID of the referenced object
        id: Option<String>,
        /// URL path to the referenced page
        path: Option<String>,
    },
}

impl Default for Line {
    fn default() -> Self {
        Line::Text(String::new())
    }
}

impl Line {
    /// Get the text or an empty string
    pub fn title_or_default(&self) -> &str {
        match self {
            Line::Text(text) => text,
            Line::Rich { title, .. } => title.as_deref().unwrap_or(""),
        }
    }
}

/// One entry (`now` or `next`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FipSongInfo {
    /// Song title
    #[serde(default)]
    pub first_line: Option<Line>,
    /// Artist
    #[serde(default)]
    pub second_line: Option<Line>,
}

impl FipSongInfo {
    pub fn title(&self) -> &str {
        self.first_line
            .as_ref()
            .map(Line::title_or_default)
            .unwrap_or("")
    }

    pub fn artist(&self) -> &str {
        self.second_line
            .as_ref()
            .map(Line::title_or_default)
            .unwrap_or("")
    }
}

/// Response of the FIP live endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FipPayload {
    pub now: Option<FipSongInfo>,
    pub next: Option<FipSongInfo>,
    /// Server-declared delay before the next refresh (milliseconds)
    #[serde(default)]
    pub delay_to_refresh: u64,
}

/// Scheduling follows `delayToRefresh` verbatim.
pub struct FipProvider;

impl SongProvider for FipProvider {
    type Payload = FipPayload;

    const NAME: &'static str = "fip";

    fn song(payload: &FipPayload) -> Option<SongInfo> {
        payload
            .now
            .as_ref()
            .map(|now| SongInfo::new(now.artist(), now.title()))
    }

    fn next_delay(payload: &FipPayload, _now: DateTime<Local>, default: Duration) -> Duration {
        // A zero delay would turn the loop into a busy poll.
        match payload.delay_to_refresh {
            0 => default,
            ms => Duration::from_millis(ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_millis(30_000);

    #[test]
    fn test_plain_lines() {
        let payload: FipPayload = serde_json::from_str(
            r#"{
                "now": {"firstLine": "Teardrop", "secondLine": "Massive Attack"},
                "next": {"firstLine": "Angel", "secondLine": "Massive Attack"},
                "delayToRefresh": 15000
            }"#,
        )
        .unwrap();

        assert_eq!(
            FipProvider::song(&payload),
            Some(SongInfo::new("Massive Attack", "Teardrop"))
        );
        assert_eq!(
            FipProvider::next_delay(&payload, Local::now(), DEFAULT),
            Duration::from_millis(15000)
        );
    }

    #[test]
    fn test_object_lines() {
        let payload: FipPayload = serde_json::from_str(
            r#"{
                "stationName": "fip",
                "delayToRefresh": 42000,
                "now": {
                    "firstLine": {"title": "So What", "id": null, "path": null},
                    "secondLine": {"title": "Miles Davis", "id": "abc", "path": "/artists/miles"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            FipProvider::song(&payload),
            Some(SongInfo::new("Miles Davis", "So What"))
        );
        assert_eq!(payload.next, None);
    }

    #[test]
    fn test_missing_now_and_delay() {
        let payload: FipPayload = serde_json::from_str(r#"{"now": null}"#).unwrap();
        assert_eq!(FipProvider::song(&payload), None);
        assert_eq!(FipProvider::next_delay(&payload, Local::now(), DEFAULT), DEFAULT);
    }
}
