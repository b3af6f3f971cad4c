/// Core error types for Soul Player
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `SoulError`
pub type Result<T> = std::result::Result<T, SoulError>;

/// Core error type for Soul Player domain validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SoulError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: String,
        /// Identifier that was looked up
        id: String,
    },
}

impl SoulError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Why a track id could not be turned into a playable stream URL.
///
/// Each variant maps to a distinct message in the UI, so callers must not
/// collapse them.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionError {
    /// Empty or placeholder identifier; rejected before any request is made
    #[error("Invalid track identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The backend has no media for this track (404)
    #[error("Track not found: {0}")]
    NotFound(String),

    /// Media exists but the adaptive manifest was never generated (422)
    #[error("Stream not available for track {0}")]
    StreamUnavailable(String),

    /// Backend or CDN misconfigured (503 and any other failure status)
    #[error("Streaming service unavailable: {message}")]
    ServiceUnavailable {
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Server-provided or locally generated detail
        message: String,
    },

    /// Returned URL matched none of the configured trust tiers
    #[error("Untrusted stream origin: {0}")]
    UntrustedOrigin(String),

    /// Transport failure, no HTTP response
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ResolutionError {
    /// Create a service-unavailable error
    pub fn service_unavailable(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_errors_render_their_detail() {
        let err = ResolutionError::service_unavailable(Some(503), "CloudFront not configured");
        assert_eq!(
            err.to_string(),
            "Streaming service unavailable: CloudFront not configured"
        );

        let err = ResolutionError::InvalidIdentifier("undefined".into());
        assert_eq!(err.to_string(), "Invalid track identifier: \"undefined\"");
    }
}
