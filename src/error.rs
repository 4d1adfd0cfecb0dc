// Error taxonomy for the library. Every failure mode the resource client
// can hit gets its own variant so callers can match on it instead of
// parsing messages.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the API clients and resource operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A business rule was violated before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A session was used before `open()` or after `close()`.
    #[error("{0}")]
    ClientNotOpen(&'static str),

    /// The request never produced a response (DNS, TLS, refused, ...).
    #[error("connection error: {0}")]
    Connection(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body did not match the expected payload shape.
    #[error("response validation failed: {0}")]
    Validation(#[from] serde_json::Error),

    /// Upload source path is missing or is not a regular file.
    #[error("the file {} does not exist or is not readable", .0.display())]
    FileNotFound(PathBuf),

    /// The storage endpoint did not accept the upload.
    #[error("failed to upload file to S3: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Status code for `Http` errors, `None` for everything else.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
