//! Player context
//!
//! Composition root: owns the queue, the controller and the engine, and is
//! the only thing UI code talks to. Intents go in through methods; state
//! comes out through [`PlayerContext::subscribe`] and
//! [`PlayerContext::events`].
//!
//! [`PlayerContext::run`] must be spawned for timeline events to reach the
//! state and for tracks to advance on natural end.

use crate::controller::{EventOutcome, PlaybackController};
use crate::engine::{AdaptiveStreamEngine, EngineEvents};
use crate::error::Result;
use crate::events::PlaybackEvent;
use crate::queue::{Queue, Removal};
use crate::sink::AudioSink;
use crate::types::{PlayOutcome, PlayerConfig, PlayerState, RepeatMode, ShuffleMode, TransportState};
use parking_lot::Mutex;
use soul_core::{StreamResolver, Track};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of `play_next` / `play_previous`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The cursor moved and a new session started
    Moved(PlayOutcome),
    /// The current track was rewound instead
    Restarted,
    /// Nothing to move to; playback untouched
    Exhausted,
}

/// What to do when the removed queue entry was the current track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalFollowUp {
    /// Play whatever now sits under the cursor
    PlayReplacement,
    /// Stop playback
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct Modes {
    repeat: RepeatMode,
    shuffle: ShuffleMode,
}

/// Single entry point for the player
pub struct PlayerContext {
    controller: PlaybackController,
    queue: Mutex<Queue>,
    modes: Mutex<Modes>,
    engine_events: Mutex<Option<EngineEvents>>,
    previous_restart_threshold: Option<Duration>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for PlayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerContext")
            .field("controller", &self.controller)
            .field("queue_len", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

impl PlayerContext {
    /// Wire a resolver and a sink together.
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        sink: Arc<dyn AudioSink>,
        config: &PlayerConfig,
    ) -> Self {
        let (engine, events) = AdaptiveStreamEngine::new(sink, config.engine.clone());
        Self::with_engine(resolver, engine, events, config)
    }

    /// Wire a resolver and an already built engine together.
    pub fn with_engine(
        resolver: Arc<dyn StreamResolver>,
        engine: AdaptiveStreamEngine,
        events: EngineEvents,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            controller: PlaybackController::new(resolver, engine, config),
            queue: Mutex::new(Queue::new()),
            modes: Mutex::new(Modes {
                repeat: config.repeat,
                shuffle: config.shuffle,
            }),
            engine_events: Mutex::new(Some(events)),
            previous_restart_threshold: config.previous_restart_threshold,
            shutdown: CancellationToken::new(),
        }
    }

    /// The underlying controller
    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Current state
    pub fn snapshot(&self) -> PlayerState {
        self.controller.snapshot()
    }

    /// Watch every state transition
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.controller.subscribe()
    }

    /// Discrete playback events
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.controller.events()
    }

    fn publish_queue(&self, queue: &Queue) {
        self.controller.publish_queue(queue);
    }

    /// Play `track`.
    ///
    /// With a `context` list the queue is replaced by it and the cursor moves
    /// to `track` (appended to the list when missing). Without one, the
    /// cursor moves to the first entry holding `track`, appending it if the
    /// queue does not contain it.
    pub async fn play_track(
        &self,
        track: Track,
        autoplay: bool,
        context: Option<Vec<Track>>,
    ) -> PlayOutcome {
        {
            let mut queue = self.queue.lock();
            match context {
                Some(mut tracks) => {
                    let index = match tracks.iter().position(|t| t.id == track.id) {
                        Some(index) => index,
                        None => {
                            tracks.push(track.clone());
                            tracks.len() - 1
                        }
                    };
                    queue.replace(tracks, index);
                }
                None => {
                    let index = match queue.position_of(&track.id) {
                        Some(index) => index,
                        None => {
                            queue.append(vec![track.clone()]);
                            queue.len() - 1
                        }
                    };
                    // Index was just found or appended
                    let _ = queue.jump_to(index);
                }
            }
            self.publish_queue(&queue);
        }

        self.controller.play_track(track, autoplay).await
    }

    /// Install `tracks` and play from `start_index` (clamped).
    ///
    /// An empty list clears the queue and leaves playback alone; `None` is
    /// returned in that case.
    pub async fn replace_queue(&self, tracks: Vec<Track>, start_index: usize) -> Option<PlayOutcome> {
        let start = {
            let mut queue = self.queue.lock();
            let start = queue.replace(tracks, start_index).cloned();
            self.publish_queue(&queue);
            start
        };

        match start {
            Some(track) => Some(self.controller.play_track(track, true).await),
            None => {
                debug!("Queue replaced with an empty list");
                None
            }
        }
    }

    /// Add `tracks` to the tail; playback is not touched.
    pub fn add_to_queue(&self, tracks: Vec<Track>) {
        let mut queue = self.queue.lock();
        queue.append(tracks);
        self.publish_queue(&queue);
    }

    /// Advance to the next entry under the current repeat/shuffle modes.
    pub async fn play_next(&self) -> Navigation {
        let Modes { repeat, shuffle } = *self.modes.lock();
        let next = {
            let mut queue = self.queue.lock();
            let next = queue.next_with(repeat, shuffle).cloned();
            if next.is_some() {
                self.publish_queue(&queue);
            }
            next
        };

        match next {
            Some(track) => Navigation::Moved(self.controller.play_track(track, true).await),
            None => {
                debug!("No next track in queue");
                Navigation::Exhausted
            }
        }
    }

    /// Go back one entry, or rewind the current track when it has played
    /// past the restart threshold or there is nothing before it.
    pub async fn play_previous(&self) -> Navigation {
        let position = self.controller.snapshot().position;
        if self
            .previous_restart_threshold
            .is_some_and(|threshold| position > threshold)
            && self.controller.restart().is_ok()
        {
            return Navigation::Restarted;
        }

        let Modes { repeat, shuffle } = *self.modes.lock();
        let (previous, current) = {
            let mut queue = self.queue.lock();
            let previous = queue.previous_with(repeat, shuffle).cloned();
            if previous.is_some() {
                self.publish_queue(&queue);
            }
            (previous, queue.current().cloned())
        };

        match (previous, current) {
            (Some(track), _) => Navigation::Moved(self.controller.play_track(track, true).await),
            (None, Some(current)) => {
                if self.controller.restart().is_ok() {
                    Navigation::Restarted
                } else {
                    Navigation::Moved(self.controller.play_track(current, true).await)
                }
            }
            (None, None) => Navigation::Exhausted,
        }
    }

    /// Remove the entry at `index`.
    ///
    /// When it was the current track, `follow_up` decides between playing
    /// the entry that slid into its place and stopping.
    ///
    /// # Errors
    /// [`PlaybackError::IndexOutOfBounds`](crate::PlaybackError::IndexOutOfBounds)
    pub async fn remove_from_queue(
        &self,
        index: usize,
        follow_up: RemovalFollowUp,
    ) -> Result<Removal> {
        let (removal, replacement) = {
            let mut queue = self.queue.lock();
            let removal = queue.remove_at(index)?;
            self.publish_queue(&queue);
            (removal, queue.current().cloned())
        };

        if removal.was_current {
            match (follow_up, replacement) {
                (RemovalFollowUp::PlayReplacement, Some(track)) => {
                    let autoplay = self.controller.snapshot().transport == TransportState::Playing;
                    self.controller.play_track(track, autoplay).await;
                }
                (RemovalFollowUp::PlayReplacement, None) | (RemovalFollowUp::Stop, _) => {
                    self.controller.shutdown();
                }
            }
        }

        Ok(removal)
    }

    /// Keep only the current track.
    pub fn clear_queue(&self) {
        let mut queue = self.queue.lock();
        queue.clear_to_current();
        self.publish_queue(&queue);
    }

    /// Set the repeat mode
    pub fn set_repeat(&self, repeat: RepeatMode) {
        let shuffle = {
            let mut modes = self.modes.lock();
            modes.repeat = repeat;
            modes.shuffle
        };
        self.controller.publish_modes(repeat, shuffle);
    }

    /// Set the shuffle mode
    pub fn set_shuffle(&self, shuffle: ShuffleMode) {
        let repeat = {
            let mut modes = self.modes.lock();
            modes.shuffle = shuffle;
            modes.repeat
        };
        self.controller.publish_modes(repeat, shuffle);
    }

    /// See [`PlaybackController::toggle_play_pause`]
    pub fn toggle_play_pause(&self) -> TransportState {
        self.controller.toggle_play_pause()
    }

    /// See [`PlaybackController::seek_to`]
    ///
    /// # Errors
    /// [`PlaybackError::NoActiveSession`](crate::PlaybackError::NoActiveSession)
    pub fn seek_to(&self, seconds: f64) -> Result<Duration> {
        self.controller.seek_to(seconds)
    }

    /// See [`PlaybackController::change_volume`]
    pub fn change_volume(&self, level: f32) -> f32 {
        self.controller.change_volume(level)
    }

    /// Mute or unmute
    pub fn set_muted(&self, muted: bool) {
        self.controller.set_muted(muted);
    }

    /// Flip the mute flag
    pub fn toggle_mute(&self) {
        self.controller.toggle_mute();
    }

    /// Feed engine events into the controller until [`shutdown`](Self::shutdown).
    ///
    /// Natural end advances the queue (or replays under `RepeatMode::One`);
    /// an exhausted queue leaves the transport in `Ended`. Only the first
    /// call does anything.
    pub async fn run(&self) {
        let Some(mut events) = self.engine_events.lock().take() else {
            warn!("Player event loop already running");
            return;
        };

        info!("Player event loop started");
        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if self.controller.handle_engine_event(event) == EventOutcome::Ended {
                self.on_track_ended().await;
            }
        }
        info!("Player event loop stopped");
    }

    async fn on_track_ended(&self) {
        let repeat = self.modes.lock().repeat;
        if repeat == RepeatMode::One {
            if self.controller.restart().is_ok() {
                return;
            }
            if let Some(track) = self.controller.snapshot().current_track {
                self.controller.play_track(track, true).await;
                return;
            }
        }

        if self.play_next().await == Navigation::Exhausted {
            info!("Queue exhausted");
        }
    }

    /// Stop the event loop and tear the session down.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.controller.shutdown();
    }
}
