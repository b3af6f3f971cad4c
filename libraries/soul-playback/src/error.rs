//! Error types for playback management

use soul_core::ResolutionError;
use thiserror::Error;

/// Playback errors returned by synchronous controller and queue operations
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No engine handle is live (nothing resolved and attached yet)
    #[error("No active playback session")]
    NoActiveSession,

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Stream URL resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Engine failure
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failures raised by the adaptive stream engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Neither native adaptive playback nor the software path is available
    #[error("Unsupported playback format: {0}")]
    UnsupportedPlaybackFormat(String),

    /// Recovery was exhausted or not applicable
    #[error("Unrecoverable playback error: {0}")]
    UnrecoverablePlaybackError(String),

    /// A newer generation claimed the sink while this attach was in flight
    #[error("Attach for generation {generation} was superseded")]
    Superseded {
        /// Generation of the discarded attach
        generation: u64,
    },
}

/// Errors reported by an [`AudioSink`](crate::AudioSink) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The sink cannot handle the requested source
    #[error("Source rejected by sink: {0}")]
    Rejected(String),

    /// Decoder failure while buffering or recovering
    #[error("Decoder error: {0}")]
    Decode(String),

    /// Playback start refused (e.g. autoplay policy)
    #[error("Playback not allowed: {0}")]
    NotAllowed(String),

    /// The handle was detached before the call reached the sink
    #[error("Stream is no longer attached")]
    Detached,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
