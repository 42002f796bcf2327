//! Error types for the WebRadio player

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the player and its persistence
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Metadata source setup failed
    #[error("Metadata error: {0}")]
    Metadata(#[from] pmosonginfo::Error),

    /// Station rejected by validation
    #[error("Invalid station: {0}")]
    InvalidStation(String),

    /// Index outside the station list
    #[error("Station index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Command needs a selected station
    #[error("No station selected")]
    NoSelection,

    /// Logging subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}
