//! Library error type.
//!
//! Every fallible operation in the library returns [`Error`]. Nothing is
//! retried or recovered locally; callers decide what to do.

use thiserror::Error;

/// Errors returned by the ordering library.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request failed or the server answered with a non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),

    /// No open store, unknown menu code, missing category root, etc.
    #[error("not found: {0}")]
    NotFound(String),

    /// The order document is incomplete, or the server reported a failure status.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Input that cannot be interpreted (unknown data format, non-numeric card field).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;
