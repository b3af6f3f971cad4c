//! Soul Player - Streaming Playback
//!
//! Platform-agnostic streaming playback for Soul Player.
//!
//! This crate provides:
//! - Audio sink seam (the single output the player drives)
//! - Adaptive stream engine (HLS manifest/segment loading, table-driven recovery)
//! - Playback controller (transport state machine, generation tokens)
//! - Play queue (cursor navigation, repeat and shuffle strategies)
//! - Player context (composition root with a watchable state snapshot)
//!
//! # Architecture
//!
//! ```text
//! PlayerContext ── Queue
//!      │
//!      ▼
//! PlaybackController ──► StreamResolver (soul-server-client)
//!      │
//!      ▼
//! AdaptiveStreamEngine ──► AudioSink (platform)
//! ```
//!
//! `soul-playback` never owns an audio device: the platform hands in an
//! [`AudioSink`] and a [`StreamResolver`](soul_core::StreamResolver), and the
//! player drives them.
//!
//! # Example: Queue Navigation
//!
//! ```rust
//! use soul_core::{Track, TrackId};
//! use soul_playback::{Queue, RepeatMode, ShuffleMode};
//!
//! let mut queue = Queue::new();
//! queue.replace(
//!     vec![
//!         Track::new(TrackId::new("a"), "First", "Artist"),
//!         Track::new(TrackId::new("b"), "Second", "Artist"),
//!     ],
//!     0,
//! );
//!
//! assert_eq!(queue.next().map(|t| t.title.as_str()), Some("Second"));
//! assert!(queue.next().is_none());
//!
//! // Repeat-all wraps around
//! let first = queue.next_with(RepeatMode::All, ShuffleMode::Off);
//! assert_eq!(first.map(|t| t.title.as_str()), Some("First"));
//! ```
//!
//! # Example: Wiring a Player
//!
//! ```rust,no_run
//! use soul_playback::{PlayerConfig, PlayerContext, AudioSink};
//! use soul_core::{StreamResolver, Track, TrackId};
//! use std::sync::Arc;
//!
//! async fn start(resolver: Arc<dyn StreamResolver>, sink: Arc<dyn AudioSink>) {
//!     let player = Arc::new(PlayerContext::new(resolver, sink, &PlayerConfig::default()));
//!
//!     // Timeline events and auto-advance
//!     let runner = Arc::clone(&player);
//!     tokio::spawn(async move { runner.run().await });
//!
//!     let tracks = vec![
//!         Track::new(TrackId::new("665f1c"), "Night Drive", "Low Tide"),
//!         Track::new(TrackId::new("665f1d"), "Tidal", "Low Tide"),
//!     ];
//!     player.replace_queue(tracks, 0).await;
//!
//!     let mut state = player.subscribe();
//!     while state.changed().await.is_ok() {
//!         println!("{:?}", state.borrow().transport);
//!     }
//! }
//! ```

mod context;
mod controller;
mod engine;
mod error;
mod events;
pub mod hls;
mod queue;
pub mod recovery;
mod sink;
pub mod types;
mod volume;

// Public exports
pub use context::{Navigation, PlayerContext, RemovalFollowUp};
pub use controller::{clamp_position, EventOutcome, PlaybackController};
pub use engine::{
    AdaptiveStreamEngine, EngineEvent, EngineEventKind, EngineEvents, EngineHandle, PlaybackMode,
};
pub use error::{EngineError, PlaybackError, Result, SinkError};
pub use events::PlaybackEvent;
pub use queue::{Queue, Removal};
pub use recovery::{ErrorClass, RecoveryAction, RecoveryPolicy};
pub use sink::{AudioSink, MediaEvent, SinkCapabilities, SinkReporter, SinkSource};
pub use types::{
    EngineConfig, FailureKind, LoadPolicy, PlayOutcome, PlaybackFailure, PlayerConfig,
    PlayerState, RepeatMode, ShuffleMode, TransportState,
};
pub use volume::Volume;
