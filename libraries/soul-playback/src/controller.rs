//! Playback controller
//!
//! Transport state machine over one [`AdaptiveStreamEngine`]:
//!
//! ```text
//!            play_track                 resolved + attached
//!   any ─────────────────► Resolving ─────────────────────► Playing / Paused
//!                              │                               │   ▲
//!                              │ failure                toggle │   │ toggle
//!                              ▼                               ▼   │
//!                            Error                          Paused ┘
//!                                                              │
//!                              Playing ── media ended ──► Ended
//! ```
//!
//! Every `play_track` call takes a fresh generation. Anything that completes
//! for an older generation (a late resolution, an attach, a timeline event)
//! is discarded. Each transition checks generation and source state inside
//! the same `watch` update, so engine events handled on another thread
//! cannot be overwritten by a stale check.

use crate::engine::{AdaptiveStreamEngine, EngineEvent, EngineEventKind, EngineHandle};
use crate::error::{EngineError, PlaybackError, Result, SinkError};
use crate::events::PlaybackEvent;
use crate::queue::Queue;
use crate::types::{
    PlayOutcome, PlaybackFailure, PlayerConfig, PlayerState, RepeatMode, ShuffleMode,
    TransportState,
};
use crate::volume::Volume;
use parking_lot::Mutex;
use soul_core::{ResolutionError, StreamResolver, Track};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 256;

/// What [`PlaybackController::handle_engine_event`] did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// From an older generation, or not applicable in the current state
    Ignored,
    /// Applied to the state
    Applied,
    /// The current track reached its end; transport is now `Ended`
    Ended,
    /// The engine gave up; transport is now `Error`
    Failed(PlaybackFailure),
}

struct Session {
    generation: u64,
    cancel: CancellationToken,
    handle: Option<EngineHandle>,
}

/// Owns the transport state of the single playback session.
pub struct PlaybackController {
    resolver: Arc<dyn StreamResolver>,
    engine: AdaptiveStreamEngine,
    state: watch::Sender<PlayerState>,
    events: broadcast::Sender<PlaybackEvent>,
    generation: AtomicU64,
    session: Mutex<Option<Session>>,
    volume: Mutex<Volume>,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl PlaybackController {
    /// Create a controller in `Idle`.
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        engine: AdaptiveStreamEngine,
        config: &PlayerConfig,
    ) -> Self {
        let volume = Volume::new(config.initial_volume);
        engine.set_volume(volume.effective());

        let (state, _) = watch::channel(PlayerState::new(config));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            resolver,
            engine,
            state,
            events,
            generation: AtomicU64::new(0),
            session: Mutex::new(None),
            volume: Mutex::new(volume),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> PlayerState {
        self.state.borrow().clone()
    }

    /// Watch every state transition
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.subscribe()
    }

    /// Discrete playback events
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Generation of the most recent `play_track`
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The engine this controller drives
    pub fn engine(&self) -> &AdaptiveStreamEngine {
        &self.engine
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn live_handle(&self) -> Option<EngineHandle> {
        self.session.lock().as_ref().and_then(|s| s.handle.clone())
    }

    /// Whether `state` still belongs to the session started for `generation`.
    fn owns(&self, state: &PlayerState, generation: u64) -> bool {
        state.generation == generation && self.is_current(generation)
    }

    /// Move `generation`'s session from one of `from` to `to`.
    ///
    /// Check and write happen under the state lock, so a concurrent
    /// transition (an engine failure, a newer `play_track`) is never
    /// overwritten. Returns whether the transition was taken.
    fn advance(&self, generation: u64, from: &[TransportState], to: TransportState) -> bool {
        let applied = self.state.send_if_modified(|state| {
            if !self.owns(state, generation) || !from.contains(&state.transport) {
                return false;
            }
            state.transport = to;
            true
        });
        if applied {
            self.emit(PlaybackEvent::StateChanged {
                state: to,
                generation,
            });
        }
        applied
    }

    fn set_position(&self, generation: u64, position: Duration) -> bool {
        self.state.send_if_modified(|state| {
            if !self.owns(state, generation) {
                return false;
            }
            state.position = position;
            true
        })
    }

    /// Start a new session for `track`.
    ///
    /// The previous session is torn down before anything else happens. The
    /// track becomes current immediately; the transport moves to `Resolving`
    /// and then to `Playing` (or `Paused` without autoplay). Failures are
    /// stored in the state as `Error` and also returned.
    pub async fn play_track(&self, track: Track, autoplay: bool) -> PlayOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        self.begin_session(generation, cancel.clone());
        self.engine.supersede(generation);

        let start = track.resume_position.unwrap_or_default();
        let mut previous_track_id = None;

        info!(track_id = %track.id, generation, autoplay, "Playing track");

        let claimed = self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            previous_track_id = state.current_track.as_ref().map(|t| t.id.to_string());
            state.current_track = Some(track.clone());
            state.transport = TransportState::Resolving;
            state.position = start;
            state.duration = (!track.duration.is_zero()).then_some(track.duration);
            state.last_error = None;
            state.generation = generation;
            true
        });
        if !claimed {
            return PlayOutcome::Superseded;
        }
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.to_string(),
            previous_track_id,
        });
        self.emit(PlaybackEvent::StateChanged {
            state: TransportState::Resolving,
            generation,
        });

        if !track.id.is_usable() {
            let err = ResolutionError::InvalidIdentifier(track.id.to_string());
            warn!(track_id = %track.id, "Refusing to resolve placeholder track id");
            return self.fail(generation, PlaybackFailure::from(&err));
        }

        let resolved = tokio::select! {
            () = cancel.cancelled() => return PlayOutcome::Superseded,
            resolved = self.resolver.resolve(&track.id) => resolved,
        };
        if !self.is_current(generation) {
            debug!(track_id = %track.id, generation, "Discarding stale resolution");
            return PlayOutcome::Superseded;
        }

        let endpoint = match resolved {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!(track_id = %track.id, error = %err, "Stream URL resolution failed");
                return self.fail(generation, PlaybackFailure::from(&err));
            }
        };

        let handle = match self.engine.attach(&endpoint, generation).await {
            Ok(handle) => handle,
            Err(EngineError::Superseded { .. }) => return PlayOutcome::Superseded,
            Err(err) => return self.fail(generation, PlaybackFailure::from(&err)),
        };

        if !self.install_handle(generation, &handle) {
            self.engine.detach(&handle);
            return PlayOutcome::Superseded;
        }

        self.engine.set_volume(self.volume.lock().effective());
        if !start.is_zero() {
            self.engine.seek(&handle, start);
        }

        let transport = if autoplay {
            match self.engine.play(&handle) {
                Ok(()) => TransportState::Playing,
                Err(SinkError::NotAllowed(reason)) => {
                    warn!(track_id = %track.id, %reason, "Autoplay refused, staying paused");
                    TransportState::Paused
                }
                // Detached covers an engine failure whose event has not been
                // handled yet; the first failure recorded wins either way
                Err(err) => {
                    let err = EngineError::UnrecoverablePlaybackError(err.to_string());
                    return self.fail(generation, PlaybackFailure::from(&err));
                }
            }
        } else {
            TransportState::Paused
        };

        if self.advance(generation, &[TransportState::Resolving], transport) {
            PlayOutcome::Started
        } else {
            self.settled_outcome(generation)
        }
    }

    /// Outcome of a session whose transition out of `Resolving` was taken
    /// by an engine event instead of `play_track`.
    fn settled_outcome(&self, generation: u64) -> PlayOutcome {
        let state = self.state.borrow();
        if !self.owns(&state, generation) {
            return PlayOutcome::Superseded;
        }
        match (state.transport, &state.last_error) {
            (TransportState::Error, Some(failure)) => PlayOutcome::Failed(failure.clone()),
            (TransportState::Playing | TransportState::Paused | TransportState::Ended, _) => {
                PlayOutcome::Started
            }
            _ => PlayOutcome::Superseded,
        }
    }

    fn begin_session(&self, generation: u64, cancel: CancellationToken) {
        let previous = self.session.lock().replace(Session {
            generation,
            cancel,
            handle: None,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
            if let Some(handle) = previous.handle {
                self.engine.detach(&handle);
            }
        }
    }

    fn install_handle(&self, generation: u64, handle: &EngineHandle) -> bool {
        match self.session.lock().as_mut() {
            Some(session) if session.generation == generation => {
                session.handle = Some(handle.clone());
                true
            }
            _ => false,
        }
    }

    fn fail(&self, generation: u64, failure: PlaybackFailure) -> PlayOutcome {
        if self.record_failure(generation, &failure) {
            PlayOutcome::Failed(failure)
        } else {
            self.settled_outcome(generation)
        }
    }

    /// Detach the session's handle and move it to `Error`.
    ///
    /// Only the first failure of a session is recorded.
    fn record_failure(&self, generation: u64, failure: &PlaybackFailure) -> bool {
        let handle = self
            .session
            .lock()
            .as_mut()
            .filter(|s| s.generation == generation)
            .and_then(|s| s.handle.take());
        if let Some(handle) = handle {
            self.engine.detach(&handle);
        }

        let applied = self.state.send_if_modified(|state| {
            if !self.owns(state, generation) || state.transport == TransportState::Error {
                return false;
            }
            state.transport = TransportState::Error;
            state.last_error = Some(failure.clone());
            true
        });
        if !applied {
            debug!(generation, kind = %failure.kind(), "Failure not recorded, session already settled");
            return false;
        }

        error!(generation, kind = %failure.kind(), message = failure.message(), "Playback failed");
        self.emit(PlaybackEvent::Error {
            failure: failure.clone(),
        });
        self.emit(PlaybackEvent::StateChanged {
            state: TransportState::Error,
            generation,
        });
        true
    }

    /// Flip between `Playing` and `Paused`; `Ended` replays from the start.
    ///
    /// No network calls. Returns the resulting transport state.
    pub fn toggle_play_pause(&self) -> TransportState {
        let transport = self.state.borrow().transport;
        let Some(handle) = self.live_handle() else {
            return transport;
        };

        match transport {
            TransportState::Playing => {
                self.engine.pause(&handle);
                self.advance(
                    handle.generation(),
                    &[TransportState::Playing],
                    TransportState::Paused,
                );
                self.state.borrow().transport
            }
            TransportState::Paused => self.resume(&handle),
            TransportState::Ended => {
                self.engine.seek(&handle, Duration::ZERO);
                self.set_position(handle.generation(), Duration::ZERO);
                self.resume(&handle)
            }
            TransportState::Idle | TransportState::Resolving | TransportState::Error => transport,
        }
    }

    fn resume(&self, handle: &EngineHandle) -> TransportState {
        match self.engine.play(handle) {
            Ok(()) => {
                self.advance(
                    handle.generation(),
                    &[TransportState::Paused, TransportState::Ended],
                    TransportState::Playing,
                );
            }
            Err(err) => warn!(error = %err, "Sink refused to start playback"),
        }
        self.state.borrow().transport
    }

    /// Rewind the live session to 0 and keep it playing.
    ///
    /// Used for "previous" past the restart threshold and for repeat-one.
    ///
    /// # Errors
    /// [`PlaybackError::NoActiveSession`] when nothing is attached.
    pub fn restart(&self) -> Result<()> {
        let handle = self.live_handle().ok_or(PlaybackError::NoActiveSession)?;
        self.engine.seek(&handle, Duration::ZERO);
        if self.set_position(handle.generation(), Duration::ZERO) {
            self.emit(PlaybackEvent::PositionUpdate {
                position_ms: 0,
                duration_ms: self.duration_ms(),
            });
        }

        let transport = self.state.borrow().transport;
        if transport == TransportState::Ended {
            self.resume(&handle);
        }
        Ok(())
    }

    /// Move the playhead to `seconds`, clamped to `[0, duration]`.
    ///
    /// The transport state is unchanged. Returns the applied position.
    ///
    /// # Errors
    /// [`PlaybackError::NoActiveSession`] when nothing is attached.
    pub fn seek_to(&self, seconds: f64) -> Result<Duration> {
        let handle = self.live_handle().ok_or(PlaybackError::NoActiveSession)?;
        let duration = self.state.borrow().duration;
        let target = clamp_position(seconds, duration);

        self.engine.seek(&handle, target);
        if self.set_position(handle.generation(), target) {
            self.emit(PlaybackEvent::PositionUpdate {
                position_ms: millis(target),
                duration_ms: self.duration_ms(),
            });
        }
        debug!(position = ?target, "Seeked");
        Ok(target)
    }

    /// Set the volume; always permitted, clamped to `[0, 1]`.
    ///
    /// Returns the stored level.
    pub fn change_volume(&self, level: f32) -> f32 {
        let (stored, effective, muted) = {
            let mut volume = self.volume.lock();
            let stored = volume.set_level(level);
            (stored, volume.effective(), volume.is_muted())
        };
        self.apply_volume(stored, effective, muted);
        stored
    }

    /// Mute or unmute; the stored level is kept.
    pub fn set_muted(&self, muted: bool) {
        let (stored, effective) = {
            let mut volume = self.volume.lock();
            if muted {
                volume.mute();
            } else {
                volume.unmute();
            }
            (volume.level(), volume.effective())
        };
        self.apply_volume(stored, effective, muted);
    }

    /// Flip the mute flag
    pub fn toggle_mute(&self) {
        let muted = self.volume.lock().is_muted();
        self.set_muted(!muted);
    }

    fn apply_volume(&self, stored: f32, effective: f32, muted: bool) {
        self.engine.set_volume(effective);
        self.state.send_modify(|state| {
            state.volume = stored;
            state.muted = muted;
        });
        self.emit(PlaybackEvent::VolumeChanged {
            level: stored,
            is_muted: muted,
        });
    }

    /// Apply an engine event to the state.
    ///
    /// Events from any generation other than the current one are ignored.
    /// Position updates only apply while `Playing`; end of media applies from
    /// `Resolving`, `Playing` or `Paused`.
    pub fn handle_engine_event(&self, event: EngineEvent) -> EventOutcome {
        let generation = event.generation;
        if !self.is_current(generation) {
            debug!(generation, current = self.generation(), "Ignoring stale engine event");
            return EventOutcome::Ignored;
        }

        match event.kind {
            EngineEventKind::TimeUpdate(position) => {
                let applied = self.state.send_if_modified(|state| {
                    if !self.owns(state, generation) || state.transport != TransportState::Playing {
                        return false;
                    }
                    state.position = position;
                    true
                });
                if !applied {
                    return EventOutcome::Ignored;
                }
                self.emit(PlaybackEvent::PositionUpdate {
                    position_ms: millis(position),
                    duration_ms: self.duration_ms(),
                });
                EventOutcome::Applied
            }
            EngineEventKind::DurationKnown(duration) => {
                let applied = self.state.send_if_modified(|state| {
                    if !self.owns(state, generation) {
                        return false;
                    }
                    state.duration = Some(duration);
                    true
                });
                if applied {
                    EventOutcome::Applied
                } else {
                    EventOutcome::Ignored
                }
            }
            EngineEventKind::Ended => {
                let mut track_id = None;
                let applied = self.state.send_if_modified(|state| {
                    let ending = matches!(
                        state.transport,
                        TransportState::Resolving | TransportState::Playing | TransportState::Paused
                    );
                    if !self.owns(state, generation) || !ending {
                        return false;
                    }
                    if let Some(duration) = state.duration {
                        state.position = duration;
                    }
                    state.transport = TransportState::Ended;
                    track_id = state.current_track.as_ref().map(|t| t.id.to_string());
                    true
                });
                if !applied {
                    return EventOutcome::Ignored;
                }

                if let Some(track_id) = track_id {
                    self.emit(PlaybackEvent::TrackFinished { track_id });
                }
                self.emit(PlaybackEvent::StateChanged {
                    state: TransportState::Ended,
                    generation,
                });
                EventOutcome::Ended
            }
            EngineEventKind::Warning(message) => {
                self.emit(PlaybackEvent::Warning { message });
                EventOutcome::Applied
            }
            EngineEventKind::Failed(err) => {
                let failure = PlaybackFailure::from(&err);
                if self.record_failure(generation, &failure) {
                    EventOutcome::Failed(failure)
                } else {
                    EventOutcome::Ignored
                }
            }
        }
    }

    /// Tear down the session and return to `Idle`.
    pub fn shutdown(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.engine.supersede(generation);
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
            if let Some(handle) = session.handle {
                self.engine.detach(&handle);
            }
        }

        info!("Playback shut down");
        let applied = self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            state.current_track = None;
            state.transport = TransportState::Idle;
            state.position = Duration::ZERO;
            state.duration = None;
            state.last_error = None;
            state.generation = generation;
            true
        });
        if applied {
            self.emit(PlaybackEvent::StateChanged {
                state: TransportState::Idle,
                generation,
            });
        }
    }

    pub(crate) fn publish_queue(&self, queue: &Queue) {
        let length = queue.len();
        let index = queue.current_index();
        self.state.send_modify(|state| {
            state.queue = queue.tracks().to_vec();
            state.queue_index = index;
        });
        self.emit(PlaybackEvent::QueueChanged { length, index });
    }

    pub(crate) fn publish_modes(&self, repeat: RepeatMode, shuffle: ShuffleMode) {
        self.state.send_modify(|state| {
            state.repeat = repeat;
            state.shuffle = shuffle;
        });
        self.emit(PlaybackEvent::ModeChanged { repeat, shuffle });
    }

    fn duration_ms(&self) -> u64 {
        self.state.borrow().duration.map_or(0, millis)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Clamp a requested position in seconds to `[0, duration]`.
///
/// NaN maps to 0; with an unknown duration only the lower bound applies.
pub fn clamp_position(seconds: f64, duration: Option<Duration>) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    match duration {
        Some(duration) if seconds >= duration.as_secs_f64() => duration,
        _ => Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX),
    }
}
