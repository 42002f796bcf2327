//! Stations and their persistence
//!
//! The station list is a JSON array of `{Name, Url, Description, Api}`
//! records, rewritten (pretty-printed) after every structural change.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

/// A web radio station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Station {
    #[serde(default, alias = "name")]
    pub name: String,
    /// Stream URL
    #[serde(default, alias = "url")]
    pub url: String,
    #[serde(default, alias = "description")]
    pub description: String,
    /// Now-playing API URL; empty means "use the stream tags"
    #[serde(default, alias = "api")]
    pub api: String,
    /// Transient display text written by the player (never persisted)
    #[serde(skip)]
    pub append: String,
}

impl Station {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    /// Non-empty name and a well-formed absolute URL.
    pub fn is_valid(&self) -> bool {
        Self::is_valid_entry(&self.name, &self.url)
    }

    pub fn is_valid_entry(name: &str, url: &str) -> bool {
        !name.is_empty() && url.trim() == url && Url::parse(url).is_ok()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidStation("empty name".to_string()));
        }
        if !self.is_valid() {
            return Err(Error::InvalidStation(format!(
                "'{}' is not an absolute URL",
                self.url
            )));
        }
        Ok(())
    }

    /// `true` when song info comes from a now-playing API.
    pub fn has_api(&self) -> bool {
        !self.api.is_empty()
    }

    /// UI label: name followed by the player's display text.
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.append)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Loads and stores the station list.
pub trait StationStore: Send {
    fn load(&self) -> Result<Vec<Station>>;

    fn store(&self, stations: &[Station]) -> Result<()>;
}

/// [`StationStore`] backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonStationStore {
    path: PathBuf,
}

impl JsonStationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StationStore for JsonStationStore {
    /// A missing file is an empty list.
    fn load(&self) -> Result<Vec<Station>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No station file yet, starting empty");
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)?;
        let stations: Vec<Station> = serde_json::from_str(&text)?;
        debug!(path = %self.path.display(), count = stations.len(), "Stations loaded");
        Ok(stations)
    }

    fn store(&self, stations: &[Station]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let text = serde_json::to_string_pretty(stations)?;
        fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), count = stations.len(), "Stations stored");
        Ok(())
    }
}

// ============================================================================
// List
// ============================================================================

/// Ordered station list, persisted on every mutation.
pub struct StationList {
    stations: Vec<Station>,
    store: Box<dyn StationStore>,
}

impl StationList {
    pub fn load(store: Box<dyn StationStore>) -> Result<Self> {
        let stations = store.load()?;
        Ok(Self { stations, store })
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn as_slice(&self) -> &[Station] {
        &self.stations
    }

    /// Display text is transient: setting it does not persist.
    pub(crate) fn set_append(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.stations.get_mut(index) {
            Some(station) => {
                station.append = text.into();
                true
            }
            None => false,
        }
    }

    /// Append a valid station; returns its index.
    pub fn push(&mut self, station: Station) -> Result<usize> {
        station.validate()?;
        self.stations.push(station);
        self.persist()?;
        Ok(self.stations.len() - 1)
    }

    /// Replace the station at `index` with a valid one.
    pub fn replace(&mut self, index: usize, station: Station) -> Result<()> {
        station.validate()?;
        let len = self.stations.len();
        let slot = self
            .stations
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        *slot = station;
        self.persist()
    }

    pub fn remove(&mut self, index: usize) -> Result<Station> {
        let len = self.stations.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let removed = self.stations.remove(index);
        self.persist()?;
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        self.store.store(&self.stations)
    }
}
