//! Process-wide state snapshot (`state.json`)

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Selection and playing flag, restored at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppState {
    /// `-1` when nothing is selected
    pub selected_index: i64,
    pub is_playing: bool,
}

impl AppState {
    pub fn new(selected_index: Option<usize>, is_playing: bool) -> Self {
        Self {
            selected_index: selected_index.map(|i| i as i64).unwrap_or(-1),
            is_playing,
        }
    }

    /// The selection as an index, if any.
    pub fn selection(&self) -> Option<usize> {
        usize::try_from(self.selected_index).ok()
    }

    /// Read the snapshot; a missing or corrupt file is a warning, not an error.
    pub fn load(path: &Path) -> Option<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read state");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read state");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string(self)?)?;
        debug!(path = %path.display(), state = ?self, "State saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip_and_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = AppState::new(Some(3), true);
        state.save(&path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"SelectedIndex":3,"IsPlaying":true}"#
        );
        assert_eq!(AppState::load(&path), Some(state));
        assert_eq!(state.selection(), Some(3));
    }

    #[test]
    fn test_missing_or_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert_eq!(AppState::load(&path), None);

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppState::load(&path), None);
    }

    #[test]
    fn test_no_selection() {
        let state = AppState::new(None, false);
        assert_eq!(state.selected_index, -1);
        assert_eq!(state.selection(), None);
    }
}
