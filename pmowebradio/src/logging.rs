//! Logging setup
//!
//! Events go to the log file of the configuration directory (plain text, no
//! ANSI colors) and optionally to the console. The level comes from
//! `logger.min_level`; `RUST_LOG` takes precedence when set.

use std::fs::OpenOptions;
use std::sync::Arc;

use pmoconfig::Config;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::{Error, Result};

/// Map a configured level name to a filter directive.
///
/// Accepts the tracing names and the usual aliases (`WARNING`,
/// `INFORMATION`, `CRITICAL`); unknown names fall back to `debug`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "INFO" | "INFORMATION" => "info",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        "OFF" | "NONE" => "off",
        _ => "debug",
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &Config) -> Result<()> {
    let level = config.get_log_min_level()?;
    let log_file = config.get_log_file()?;
    let enable_console = config.get_log_enable_console()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&level)));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(file))
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    let console_layer = enable_console.then(|| {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    info!(file = %log_file.display(), level = %level, console = enable_console, "Initializing !");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive(" Information "), "info");
        assert_eq!(level_directive("bogus"), "debug");
    }
}
