//! Error types for o2mc-core

use thiserror::Error;

/// Main error type for the o2mc-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (empty or malformed app id, endpoint, interval)
    #[error("configuration error: {0}")]
    Config(String),

    /// No async runtime available to drive the dispatch timer
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Transport-level HTTP failure (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("dispatch rejected ({status}): {body}")]
    Dispatch { status: u16, body: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging setup error
    #[error("logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Whether a failed dispatch is worth retrying on a later cycle.
    ///
    /// Transport failures and 5xx are transient. 408 and 429 are too;
    /// any other 4xx means the endpoint will never accept the batch.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Dispatch { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}

/// Result type alias for o2mc-core
pub type Result<T> = std::result::Result<T, Error>;
