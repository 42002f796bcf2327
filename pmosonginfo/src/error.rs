//! Error types for metadata sources

/// Result type alias for metadata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching now-playing metadata
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned status: {0}")]
    Status(u16),

    /// Payload could not be decoded
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error came from the network (request or status)
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status(_))
    }
}
