//! Playback Events
//!
//! Broadcast to every subscriber alongside the state snapshot so UI code can
//! react to discrete moments (toasts, track-change animations) without
//! diffing snapshots:
//! - Transport state changes
//! - Track changes (immediately on `play_track`)
//! - Position updates (while playing)
//! - Volume, queue and mode changes
//! - Failures

use crate::types::{PlaybackFailure, RepeatMode, ShuffleMode, TransportState};
use serde::Serialize;

/// Events emitted by the playback system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PlaybackEvent {
    /// Transport state changed
    StateChanged {
        /// The new transport state
        state: TransportState,
        /// Session generation the change belongs to
        generation: u64,
    },

    /// A new track became current
    TrackChanged {
        /// ID of the new (current) track
        track_id: String,
        /// ID of the previous track (if any)
        previous_track_id: Option<String>,
    },

    /// Track finished playing naturally (reached end)
    TrackFinished {
        /// ID of the finished track
        track_id: String,
    },

    /// Position update while playing
    PositionUpdate {
        /// Current playback position
        position_ms: u64,
        /// Known duration (0 while unknown)
        duration_ms: u64,
    },

    /// Volume changed
    VolumeChanged {
        /// New volume level (0.0-1.0)
        level: f32,
        /// Whether audio is muted
        is_muted: bool,
    },

    /// Queue contents or cursor changed
    QueueChanged {
        /// New queue length
        length: usize,
        /// Cursor position
        index: Option<usize>,
    },

    /// Repeat or shuffle changed
    ModeChanged {
        /// Repeat mode
        repeat: RepeatMode,
        /// Shuffle mode
        shuffle: ShuffleMode,
    },

    /// A non-fatal pipeline problem; playback continues
    Warning {
        /// Description
        message: String,
    },

    /// The session failed and is now in `Error`
    Error {
        /// Classification and message
        failure: PlaybackFailure,
    },
}
