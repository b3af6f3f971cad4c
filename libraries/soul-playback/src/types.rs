//! Core types for playback management

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use soul_core::{ResolutionError, Track};
use std::fmt;
use std::time::Duration;

/// Transport state of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// Nothing requested yet, or shut down
    #[default]
    Idle,

    /// Waiting on stream URL resolution and engine attach
    Resolving,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Reached the end of the media and the queue had no successor
    Ended,

    /// Resolution or engine failure; see `PlayerState::last_error`
    Error,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop entire queue
    All,

    /// Loop current track only (on natural end; manual next still advances)
    One,
}

/// Shuffle mode
///
/// Shuffle picks among existing indices; the queue itself is never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// No shuffling
    #[default]
    Off,

    /// Any index other than the current one
    Random,
}

/// Timeout and retry budget for one kind of HLS request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPolicy {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl LoadPolicy {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Pause between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Configuration for the adaptive stream engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master and media playlist requests (default: 10 s, 3 retries, 1 s delay)
    pub manifest: LoadPolicy,

    /// Media segment requests (default: 20 s, 6 retries, 1 s delay)
    pub segment: LoadPolicy,

    /// Highest variant bandwidth to pick, in bits per second (default: no cap)
    pub max_bandwidth: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            manifest: LoadPolicy {
                timeout_ms: 10_000,
                max_retries: 3,
                retry_delay_ms: 1_000,
            },
            segment: LoadPolicy {
                timeout_ms: 20_000,
                max_retries: 6,
                retry_delay_ms: 1_000,
            },
            max_bandwidth: None,
        }
    }
}

/// Configuration for the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial volume (0.0-1.0, default: 0.7)
    pub initial_volume: f32,

    /// `play_previous` restarts the current track once the position is past
    /// this point (default: 3 s, `None` disables it)
    #[serde(with = "optional_secs")]
    pub previous_restart_threshold: Option<Duration>,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Initial shuffle mode (default: Off)
    pub shuffle: ShuffleMode,

    /// Engine settings
    pub engine: EngineConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_volume: 0.7,
            previous_restart_threshold: Some(Duration::from_secs(3)),
            repeat: RepeatMode::Off,
            shuffle: ShuffleMode::Off,
            engine: EngineConfig::default(),
        }
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

/// Classification of a failed `play_track`, stored in the observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Empty or placeholder track id
    InvalidIdentifier,
    /// Backend has no media for the track
    NotFound,
    /// Media exists but the adaptive manifest does not
    StreamUnavailable,
    /// Backend or CDN misconfigured
    ServiceUnavailable,
    /// Returned URL failed origin validation
    UntrustedOrigin,
    /// Transport failure during resolution
    NetworkError,
    /// Runtime cannot play the stream
    UnsupportedPlaybackFormat,
    /// Engine gave up
    UnrecoverablePlaybackError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::InvalidIdentifier => "invalid-identifier",
            FailureKind::NotFound => "not-found",
            FailureKind::StreamUnavailable => "stream-unavailable",
            FailureKind::ServiceUnavailable => "service-unavailable",
            FailureKind::UntrustedOrigin => "untrusted-origin",
            FailureKind::NetworkError => "network-error",
            FailureKind::UnsupportedPlaybackFormat => "unsupported-playback-format",
            FailureKind::UnrecoverablePlaybackError => "unrecoverable-playback-error",
        };
        f.write_str(name)
    }
}

/// Why the current session is in [`TransportState::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    kind: FailureKind,
    message: String,
}

impl PlaybackFailure {
    /// Create a failure with an explicit message
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure classification
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Message suitable for an inline UI notice
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PlaybackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&ResolutionError> for PlaybackFailure {
    fn from(err: &ResolutionError) -> Self {
        let (kind, message) = match err {
            ResolutionError::InvalidIdentifier(_) => {
                (FailureKind::InvalidIdentifier, "Invalid song ID".to_string())
            }
            ResolutionError::NotFound(_) => (
                FailureKind::NotFound,
                "Song not found or not available for streaming".to_string(),
            ),
            ResolutionError::StreamUnavailable(_) => (
                FailureKind::StreamUnavailable,
                "This song is still being processed for streaming".to_string(),
            ),
            ResolutionError::ServiceUnavailable { message, .. } => (
                FailureKind::ServiceUnavailable,
                format!("Streaming service unavailable: {message}"),
            ),
            ResolutionError::UntrustedOrigin(_) => (
                FailureKind::UntrustedOrigin,
                "Invalid streaming URL received from server".to_string(),
            ),
            ResolutionError::NetworkError(_) => (
                FailureKind::NetworkError,
                "Network error: unable to reach the streaming service".to_string(),
            ),
        };
        Self::new(kind, message)
    }
}

impl From<&EngineError> for PlaybackFailure {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::UnsupportedPlaybackFormat(_) => Self::new(
                FailureKind::UnsupportedPlaybackFormat,
                "This audio format is not supported on this device",
            ),
            EngineError::UnrecoverablePlaybackError(detail) => Self::new(
                FailureKind::UnrecoverablePlaybackError,
                format!("Playback failed: {detail}"),
            ),
            EngineError::Superseded { .. } => {
                Self::new(FailureKind::UnrecoverablePlaybackError, err.to_string())
            }
        }
    }
}

/// Observable snapshot of the player.
///
/// Published through a `tokio::sync::watch` channel on every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    /// Track of the current session (set optimistically on `play_track`)
    pub current_track: Option<Track>,
    /// Transport state
    pub transport: TransportState,
    /// Playback position
    pub position: Duration,
    /// Media duration; advisory until the engine reports it
    pub duration: Option<Duration>,
    /// Stored volume level (0.0-1.0); preserved while muted
    pub volume: f32,
    /// Mute flag
    pub muted: bool,
    /// Why the session is in `Error`
    pub last_error: Option<PlaybackFailure>,
    /// Queue contents
    pub queue: Vec<Track>,
    /// Cursor into `queue`; `None` when the queue is empty
    pub queue_index: Option<usize>,
    /// Repeat mode
    pub repeat: RepeatMode,
    /// Shuffle mode
    pub shuffle: ShuffleMode,
    /// Generation of the current session (0 before the first `play_track`)
    pub generation: u64,
}

impl PlayerState {
    pub(crate) fn new(config: &PlayerConfig) -> Self {
        Self {
            current_track: None,
            transport: TransportState::Idle,
            position: Duration::ZERO,
            duration: None,
            volume: config.initial_volume.clamp(0.0, 1.0),
            muted: false,
            last_error: None,
            queue: Vec::new(),
            queue_index: None,
            repeat: config.repeat,
            shuffle: config.shuffle,
            generation: 0,
        }
    }

    /// Whether the transport is `Playing`
    pub fn is_playing(&self) -> bool {
        self.transport == TransportState::Playing
    }

    /// Position as a percentage of the duration (0 when unknown)
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) if !duration.is_zero() => {
                (self.position.as_secs_f64() / duration.as_secs_f64() * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new(&PlayerConfig::default())
    }
}

/// Result of a `play_track` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The session is live (playing, or paused when autoplay was off)
    Started,
    /// A newer `play_track` took over; nothing from this call was applied
    Superseded,
    /// Resolution or attach failed; the state is `Error`
    Failed(PlaybackFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlayerConfig::default();
        assert!((config.initial_volume - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.previous_restart_threshold, Some(Duration::from_secs(3)));
        assert_eq!(config.repeat, RepeatMode::Off);
        assert_eq!(config.shuffle, ShuffleMode::Off);
    }

    #[test]
    fn engine_defaults_match_loader_settings() {
        let config = EngineConfig::default();
        assert_eq!(config.manifest.timeout(), Duration::from_secs(10));
        assert_eq!(config.manifest.max_retries, 3);
        assert_eq!(config.segment.timeout(), Duration::from_secs(20));
        assert_eq!(config.segment.max_retries, 6);
        assert_eq!(config.segment.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn config_from_partial_json() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{"previous_restart_threshold": null, "repeat": "all"}"#)
                .unwrap();
        assert_eq!(config.previous_restart_threshold, None);
        assert_eq!(config.repeat, RepeatMode::All);
        assert_eq!(config.engine, EngineConfig::default());

        let config: PlayerConfig =
            serde_json::from_str(r#"{"previous_restart_threshold": 5.5}"#).unwrap();
        assert_eq!(
            config.previous_restart_threshold,
            Some(Duration::from_millis(5500))
        );
    }

    #[test]
    fn progress_is_zero_without_duration() {
        let mut state = PlayerState::default();
        state.position = Duration::from_secs(30);
        assert_eq!(state.progress(), 0.0);

        state.duration = Some(Duration::from_secs(120));
        assert!((state.progress() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn failure_kinds_follow_resolution_errors() {
        let cases = [
            (ResolutionError::InvalidIdentifier("null".into()), FailureKind::InvalidIdentifier),
            (ResolutionError::NotFound("a".into()), FailureKind::NotFound),
            (ResolutionError::StreamUnavailable("a".into()), FailureKind::StreamUnavailable),
            (
                ResolutionError::service_unavailable(Some(503), "CloudFront not configured"),
                FailureKind::ServiceUnavailable,
            ),
            (ResolutionError::UntrustedOrigin("x".into()), FailureKind::UntrustedOrigin),
            (ResolutionError::NetworkError("x".into()), FailureKind::NetworkError),
        ];

        for (err, kind) in cases {
            assert_eq!(PlaybackFailure::from(&err).kind(), kind);
        }
    }

    #[test]
    fn engine_failures_classified() {
        let failure =
            PlaybackFailure::from(&EngineError::UnsupportedPlaybackFormat("no hls".into()));
        assert_eq!(failure.kind(), FailureKind::UnsupportedPlaybackFormat);

        let failure =
            PlaybackFailure::from(&EngineError::UnrecoverablePlaybackError("decode".into()));
        assert_eq!(failure.kind(), FailureKind::UnrecoverablePlaybackError);
        assert!(failure.message().contains("decode"));
    }
}
