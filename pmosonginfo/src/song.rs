//! The reconciled "now playing" value

use std::fmt;
use std::sync::Arc;

use pmostream::TagInfo;

/// Artist/title snapshot, replaced wholesale on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SongInfo {
    pub artist: String,
    pub title: String,
}

impl SongInfo {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Either field empty.
    pub fn is_empty(&self) -> bool {
        self.artist.is_empty() || self.title.is_empty()
    }
}

impl fmt::Display for SongInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.artist, self.title)
    }
}

impl From<TagInfo> for SongInfo {
    fn from(tags: TagInfo) -> Self {
        Self {
            artist: tags.artist,
            title: tags.title,
        }
    }
}

/// Receives song updates from a metadata source.
///
/// Called from the source's own context (engine callback or tokio task);
/// implementations forward to the owning thread.
pub type SongInfoSink = Arc<dyn Fn(SongInfo) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_when_either_field_missing() {
        assert!(SongInfo::empty().is_empty());
        assert!(SongInfo::new("", "Title").is_empty());
        assert!(SongInfo::new("Artist", "").is_empty());
        assert!(!SongInfo::new("Artist", "Title").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(SongInfo::new("Björk", "Jóga").to_string(), "Björk / Jóga");
    }
}
