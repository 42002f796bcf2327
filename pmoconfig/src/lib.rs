//! # pmoconfig - WebRadio configuration
//!
//! One YAML document per user, stored as `config.yaml` in the configuration
//! directory (`.radio-console` by default). The embedded defaults
//! (`webradio.yaml`) are overlaid with the user file and with
//! `WEBRADIO_CONFIG__SECTION__KEY` environment variables, then written back
//! so the file always lists every key.
//!
//! Typed accessors cover the player, the metadata sources, the managed files
//! (stations, state, log) and the logger.
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//!
//! let volume = config.get_player_volume()?;
//! let stations = config.get_stations_file()?;
//! println!("{} stations file, volume {}", stations.display(), volume);
//!
//! config.set_player_volume(0.5)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, bail, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("webradio.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load WebRadio configuration"));
}

const ENV_CONFIG_DIR: &str = "WEBRADIO_CONFIG";
const ENV_PREFIX: &str = "WEBRADIO_CONFIG__";
const CONFIG_DIR_NAME: &str = ".radio-console";

// Default values for configuration
const DEFAULT_PLAYER_VOLUME: f32 = 1.0;
const DEFAULT_SHOW_DOWNLOAD_INFO: bool = true;
const DEFAULT_SHOW_ICY_TAGS: bool = true;
const DEFAULT_TICKER_INTERVAL_MS: u64 = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = "WebRadio/0.1 (pmosonginfo)";
const DEFAULT_STATIONS_FILE: &str = "stations.json";
const DEFAULT_STATE_FILE: &str = "state.json";
const DEFAULT_LOG_FILE: &str = "log.txt";
const DEFAULT_LOG_MIN_LEVEL: &str = "DEBUG";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = false;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// WebRadio configuration
///
/// One YAML document, kept in memory and written back to `config.yaml`
/// after every change. Values are addressed by key paths
/// (`&["player", "volume"]`); keys are case-insensitive.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data().clone()),
        }
    }
}

impl Config {
    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// First usable configuration directory.
    ///
    /// An explicit directory wins, then `WEBRADIO_CONFIG`, then an existing
    /// `.radio-console` in the working directory or in the home directory.
    /// Falls back to `./.radio-console`.
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory from environment");
            return from_env;
        }

        let local = PathBuf::from(CONFIG_DIR_NAME);
        let home = home_dir().map(|home| home.join(CONFIG_DIR_NAME));

        [Some(local), home]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
            .map(|found| found.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_DIR_NAME.to_string())
    }

    /// Create `path` if needed and make sure it is a writable directory.
    fn ensure_writable_dir(path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            bail!("Config path {} is not a directory", path.display());
        }

        let marker = path.join(".write_test");
        fs::write(&marker, b"ok")?;
        fs::remove_file(&marker)?;
        Ok(())
    }

    /// Resolve the configuration directory and create it when missing.
    ///
    /// See [`Config::load_config`] for the search order.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::find_config_dir(directory);
        Self::ensure_writable_dir(Path::new(&dir))?;
        Ok(dir)
    }

    /// Load the configuration of `directory` (empty: search for it).
    ///
    /// Search order when `directory` is empty: `WEBRADIO_CONFIG`, then
    /// `.radio-console` in the working directory, then in the home directory.
    ///
    /// The embedded defaults are overlaid with `config.yaml` when it exists,
    /// keys are lower-cased, `WEBRADIO_CONFIG__SECTION__KEY` variables are
    /// applied and the result is written back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let path = Path::new(&config_dir)
            .join("config.yaml")
            .to_string_lossy()
            .into_owned();
        info!(config_dir = %config_dir, "Using config directory");

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read_to_string(&path) {
            Ok(text) => {
                info!(config_file = %path, "Loaded config file");
                let user: Value = serde_yaml::from_str(&text)?;
                merge_yaml(&mut value, &user);
            }
            Err(_) => info!(config_file = %path, "No config file, using embedded defaults"),
        }

        let mut value = lowercase_keys(value);
        Self::apply_env_overrides(&mut value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(value),
        };
        config.save()?;
        Ok(config)
    }

    /// Directory holding config.yaml and every managed file
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Write the configuration to `config.yaml`.
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Set the value at `path` (e.g. `&["player", "volume"]`) and save.
    ///
    /// Missing intermediate sections are created.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        Self::set_value_internal(&mut self.data(), path, value)?;
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            *data = value;
            return Ok(());
        };

        let mut node = data;
        for key in parents {
            node = match node {
                Value::Mapping(map) => map
                    .entry(Value::String(key.to_lowercase()))
                    .or_insert(Value::Mapping(Mapping::new())),
                _ => bail!("Cannot set {}: {} is not a section", path.join("."), key),
            };
        }

        match node {
            Value::Mapping(map) => {
                map.insert(Value::String(last.to_lowercase()), value);
                Ok(())
            }
            _ => Err(anyhow!("Cannot set {}: parent is not a section", path.join("."))),
        }
    }

    /// Value at `path`; an error when the path does not exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        Self::get_value_internal(&self.data(), path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        path.iter()
            .try_fold(data, |node, key| match node {
                Value::Mapping(map) => map
                    .get(key.to_lowercase())
                    .ok_or_else(|| anyhow!("Path {} does not exist", path.join("."))),
                _ => Err(anyhow!("Path {} crosses a scalar", path.join("."))),
            })
            .cloned()
    }

    /// Apply `WEBRADIO_CONFIG__SECTION__KEY=value` variables.
    ///
    /// Values are parsed as YAML scalars (`0.5`, `true`), anything else is
    /// kept as a string.
    fn apply_env_overrides(config: &mut Value) {
        for (name, raw) in env::vars() {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<&str> = key.split("__").collect();
            let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw.clone()));

            if let Err(e) = Self::set_value_internal(config, &path, value) {
                tracing::warn!(variable = %name, error = %e, "Ignoring config override");
            }
        }
    }

    /// Résout un chemin de fichier relatif au répertoire de configuration
    ///
    /// The parent directory is created when missing, the file itself is not.
    fn resolve_file(&self, file_path: &str) -> Result<PathBuf> {
        let path = Path::new(file_path);
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(path)
        };

        if let Some(parent) = absolute_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!(directory=%parent.display(), "Created directory");
            }
        }

        Ok(absolute_path)
    }

    /// Récupère un fichier géré par la configuration
    ///
    /// The file name may be absolute or relative to the configuration
    /// directory. When the entry is missing the default is persisted.
    ///
    /// ```no_run
    /// use pmoconfig::get_config;
    ///
    /// let config = get_config();
    /// let stations = config.get_managed_file(&["files", "stations"], "stations.json")?;
    /// println!("Stations file: {}", stations.display());
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn get_managed_file(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let file_path = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_managed_file(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_file(&file_path)
    }

    /// Définit un fichier géré par la configuration
    pub fn set_managed_file(&self, path: &[&str], file: String) -> Result<()> {
        self.set_value(path, Value::String(file))
    }

    /// Volume applied to new streams (0.0 ..= 1.0)
    pub fn get_player_volume(&self) -> Result<f32> {
        match self.get_value(&["player", "volume"]) {
            Ok(Value::Number(n)) => match n.as_f64() {
                Some(v) if (0.0..=1.0).contains(&v) => Ok(v as f32),
                _ => {
                    tracing::warn!(
                        "Invalid player volume {}, using default {}",
                        n,
                        DEFAULT_PLAYER_VOLUME
                    );
                    Ok(DEFAULT_PLAYER_VOLUME)
                }
            },
            _ => Ok(DEFAULT_PLAYER_VOLUME),
        }
    }

    pub fn set_player_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0) as f64;
        self.set_value(&["player", "volume"], Value::Number(Number::from(volume)))
    }

    impl_bool_config!(
        get_show_download_info,
        set_show_download_info,
        &["player", "show_download_info"],
        DEFAULT_SHOW_DOWNLOAD_INFO
    );

    impl_bool_config!(
        get_show_icy_tags,
        set_show_icy_tags,
        &["player", "show_icy_tags"],
        DEFAULT_SHOW_ICY_TAGS
    );

    impl_u64_config!(
        get_ticker_interval_ms,
        set_ticker_interval_ms,
        &["player", "ticker_interval_ms"],
        DEFAULT_TICKER_INTERVAL_MS
    );

    impl_u64_config!(
        get_default_poll_interval_ms,
        set_default_poll_interval_ms,
        &["metadata", "default_poll_interval_ms"],
        DEFAULT_POLL_INTERVAL_MS
    );

    impl_u64_config!(
        get_http_timeout_secs,
        set_http_timeout_secs,
        &["metadata", "http_timeout_secs"],
        DEFAULT_HTTP_TIMEOUT_SECS
    );

    impl_string_config!(
        get_user_agent,
        set_user_agent,
        &["metadata", "user_agent"],
        DEFAULT_USER_AGENT
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Station list file (JSON)
    pub fn get_stations_file(&self) -> Result<PathBuf> {
        self.get_managed_file(&["files", "stations"], DEFAULT_STATIONS_FILE)
    }

    /// Selection/playing snapshot written at shutdown
    pub fn get_state_file(&self) -> Result<PathBuf> {
        self.get_managed_file(&["files", "state"], DEFAULT_STATE_FILE)
    }

    pub fn get_log_file(&self) -> Result<PathBuf> {
        self.get_managed_file(&["logger", "file"], DEFAULT_LOG_FILE)
    }
}

/// Returns the global configuration instance
///
/// This function provides access to the singleton configuration instance,
/// which is lazily loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Lower-case every mapping key, recursively.
fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (key, lowercase_keys(value))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Overlay `user` on `base`: sections merge key by key, any other value
/// (scalar, sequence) replaces the base one.
fn merge_yaml(base: &mut Value, user: &Value) {
    match (base, user) {
        (Value::Mapping(base_map), Value::Mapping(user_map)) => {
            for (key, value) in user_map {
                if let Some(slot) = base_map.get_mut(key) {
                    merge_yaml(slot, value);
                } else {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}
