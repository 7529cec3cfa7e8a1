//! Error types for the harvesting pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during harvesting.
///
/// Rate limiting is a distinguished variant because the ingestion driver
/// backs off much longer for it than for other source failures. Key-fetch
/// failures never appear here: the fetcher downgrades them to an empty key
/// set.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream throttling detected on an enumeration call.
    #[error("rate limited by upstream")]
    RateLimited,

    /// Enumeration call failed (non-success response, malformed listing).
    #[error("source error: {0}")]
    Source(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is the distinguished rate-limit signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimited)
    }
}
