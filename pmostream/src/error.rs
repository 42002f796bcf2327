//! Error types for the stream layer

/// Result type alias for stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or reading a network stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    /// IO error while reading the stream body
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with a non-success status
    #[error("Server returned status: {0}")]
    Status(u16),

    /// Only http(s) URLs are supported by the ICY transport
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
