//! Extension pour intégrer le lecteur WebRadio dans pmoconfig
//!
//! Ce module fournit le trait `WebRadioConfigExt` qui convertit la
//! configuration en options typées pour le contrôleur de lecture et les
//! sources de métadonnées.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmowebradio::WebRadioConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let player = config.get_player_options()?;
//! println!("Volume: {}", player.volume);
//! println!("Stations: {}", config.get_stations_file()?.display());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Result;
use pmoconfig::Config;
use pmosonginfo::PollingOptions;

use crate::controller::PlayerOptions;
use crate::station::JsonStationStore;

/// Trait d'extension pour la configuration du lecteur
pub trait WebRadioConfigExt {
    /// Options du contrôleur (volume initial, journalisation du flux, ticker)
    fn get_player_options(&self) -> Result<PlayerOptions>;

    /// Options des sources interrogées par HTTP
    fn get_polling_options(&self) -> Result<PollingOptions>;

    /// Magasin JSON de la liste des stations
    fn station_store(&self) -> Result<JsonStationStore>;
}

impl WebRadioConfigExt for Config {
    fn get_player_options(&self) -> Result<PlayerOptions> {
        Ok(PlayerOptions {
            volume: self.get_player_volume()?,
            show_download_info: self.get_show_download_info()?,
            show_icy_tags: self.get_show_icy_tags()?,
            ticker_interval: Duration::from_millis(self.get_ticker_interval_ms()?.max(10)),
        })
    }

    fn get_polling_options(&self) -> Result<PollingOptions> {
        Ok(PollingOptions {
            default_interval: Duration::from_millis(self.get_default_poll_interval_ms()?.max(1000)),
            timeout: Duration::from_secs(self.get_http_timeout_secs()?.max(1)),
            user_agent: self.get_user_agent()?,
        })
    }

    fn station_store(&self) -> Result<JsonStationStore> {
        Ok(JsonStationStore::new(self.get_stations_file()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let player = config.get_player_options().unwrap();
        assert_eq!(player.volume, 1.0);
        assert!(player.show_download_info);
        assert!(player.show_icy_tags);
        assert_eq!(player.ticker_interval, Duration::from_millis(100));

        let polling = config.get_polling_options().unwrap();
        assert_eq!(polling.default_interval, Duration::from_millis(30_000));
        assert_eq!(polling.timeout, Duration::from_secs(30));

        let store = config.station_store().unwrap();
        assert_eq!(store.path(), dir.path().join("stations.json"));
    }

    #[test]
    fn test_overrides() {
        let dir = tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        config.set_player_volume(0.5).unwrap();
        config.set_ticker_interval_ms(250).unwrap();
        config.set_default_poll_interval_ms(10).unwrap();

        assert_eq!(config.get_player_options().unwrap().volume, 0.5);
        assert_eq!(
            config.get_player_options().unwrap().ticker_interval,
            Duration::from_millis(250)
        );
        // Clamped to one second
        assert_eq!(
            config.get_polling_options().unwrap().default_interval,
            Duration::from_secs(1)
        );
    }
}
