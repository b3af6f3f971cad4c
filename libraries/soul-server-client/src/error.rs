//! Error types for the Soul Server client.

use soul_core::ResolutionError;
use thiserror::Error;

/// Errors that can occur when talking to the streaming API outside of
/// stream resolution (which reports [`ResolutionError`] instead).
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Authentication required but no token available
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// Stream URL resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl ServerClientError {
    /// Map a transport error, separating "no response at all" from other failures.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ServerClientError::ServerUnreachable(err.to_string())
        } else {
            ServerClientError::Request(err)
        }
    }
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;
