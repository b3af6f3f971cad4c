//! Adaptive stream engine
//!
//! Binds one stream at a time to the shared [`AudioSink`]:
//!
//! ```text
//! attach(endpoint, generation)
//!   ├─ direct media URL ──────────────► sink.load(Url)
//!   ├─ manifest + native HLS sink ────► sink.load(Url)
//!   ├─ manifest + media-source sink ──► fetch playlists, sink.load(Segments),
//!   │                                   segment loader task ─► sink.append_segment
//!   └─ manifest, neither ─────────────► UnsupportedPlaybackFormat
//! ```
//!
//! Each live handle owns a driver task that receives the sink's media events,
//! applies the [`RecoveryPolicy`] to fatal errors, and forwards timeline
//! events tagged with the handle's generation. Detaching cancels the driver
//! and every fetch it owns before the sink is reset.

use crate::error::{EngineError, SinkError};
use crate::hls::{self, FetchError, LoadError, MediaPlaylist};
use crate::recovery::{ErrorClass, RecoveryDecision, RecoveryPolicy, RecoveryState};
use crate::sink::{AudioSink, MediaEvent, SinkReporter, SinkSource};
use crate::types::{EngineConfig, LoadPolicy};
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Client;
use soul_core::{StreamEndpoint, StreamKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// How a handle feeds the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Plain media file loaded by URL
    Direct,
    /// Manifest handed to a sink with built-in HLS
    Native,
    /// Engine fetches segments and pushes them into the sink
    Software,
}

/// Proof of one successful attach.
///
/// Stale handles are harmless: every operation on a handle that is no longer
/// live is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHandle {
    id: u64,
    generation: u64,
    mode: PlaybackMode,
}

impl EngineHandle {
    /// Generation passed to `attach`
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Feeding mode
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }
}

/// Timeline and failure notifications, tagged with the session generation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    /// Generation of the handle that produced the event
    pub generation: u64,
    /// What happened
    pub kind: EngineEventKind,
}

/// Engine event payload
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// Playhead moved
    TimeUpdate(Duration),
    /// Duration became known
    DurationKnown(Duration),
    /// Natural end of media
    Ended,
    /// Non-fatal problem; playback continues
    Warning(String),
    /// Recovery exhausted; the handle has already been detached
    Failed(EngineError),
}

/// Receiving end of the engine's event stream
#[derive(Debug)]
pub struct EngineEvents {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineEvents {
    /// Next event; `None` once the engine is dropped
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

}

struct Live {
    handle: EngineHandle,
    cancel: CancellationToken,
    controls: mpsc::UnboundedSender<Control>,
    playing: bool,
}

enum Control {
    Seek(Duration),
}

struct Pending {
    id: u64,
    generation: u64,
    cancel: CancellationToken,
}

/// Removes a pending attach however the attach future ends, including
/// being dropped mid-await.
struct PendingGuard<'a> {
    pending: &'a Mutex<Vec<Pending>>,
    id: u64,
}

impl<'a> PendingGuard<'a> {
    fn register(pending: &'a Mutex<Vec<Pending>>, entry: Pending) -> Self {
        let id = entry.id;
        pending.lock().push(entry);
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().retain(|p| p.id != self.id);
    }
}

struct Inner {
    sink: Arc<dyn AudioSink>,
    http: Client,
    config: EngineConfig,
    policy: RecoveryPolicy,
    events: mpsc::UnboundedSender<EngineEvent>,
    next_id: AtomicU64,
    latest: AtomicU64,
    pending: Mutex<Vec<Pending>>,
    live: Mutex<Option<Live>>,
}

impl Inner {
    fn emit(&self, generation: u64, kind: EngineEventKind) {
        // Receiver gone means nobody is listening anymore
        let _ = self.events.send(EngineEvent { generation, kind });
    }

    /// Run `f` against the live session if `id` is still the one bound.
    fn with_live<R>(&self, id: u64, f: impl FnOnce(&mut Live, &dyn AudioSink) -> R) -> Option<R> {
        let mut guard = self.live.lock();
        match guard.as_mut() {
            Some(live) if live.handle.id == id => Some(f(live, self.sink.as_ref())),
            _ => None,
        }
    }

    /// Tear down a session. Caller holds the `live` lock so a new attach
    /// cannot slip in between cancel and reset.
    fn teardown(&self, live: Live, reason: &str) {
        live.cancel.cancel();
        self.sink.reset();
        info!(
            generation = live.handle.generation,
            mode = ?live.handle.mode,
            reason,
            "Engine detached"
        );
    }

    fn detach_id(&self, id: u64, reason: &str) -> bool {
        let mut guard = self.live.lock();
        match guard.take() {
            Some(live) if live.handle.id == id => {
                self.teardown(live, reason);
                true
            }
            other => {
                *guard = other;
                false
            }
        }
    }

    fn detach_older_than(&self, generation: u64) {
        let mut guard = self.live.lock();
        match guard.take() {
            Some(live) if live.handle.generation < generation => {
                self.teardown(live, "replaced by newer attach");
            }
            other => *guard = other,
        }
    }
}

/// Adaptive stream engine bound to one audio sink
#[derive(Clone)]
pub struct AdaptiveStreamEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AdaptiveStreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveStreamEngine")
            .field("config", &self.inner.config)
            .field("live", &self.live_handle())
            .field("pending", &self.pending_attaches())
            .finish_non_exhaustive()
    }
}

impl AdaptiveStreamEngine {
    /// Create an engine with the default recovery policy.
    pub fn new(sink: Arc<dyn AudioSink>, config: EngineConfig) -> (Self, EngineEvents) {
        Self::with_options(sink, config, RecoveryPolicy::default(), Client::new())
    }

    /// Create an engine with an explicit policy and HTTP client.
    pub fn with_options(
        sink: Arc<dyn AudioSink>,
        config: EngineConfig,
        policy: RecoveryPolicy,
        http: Client,
    ) -> (Self, EngineEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            inner: Arc::new(Inner {
                sink,
                http,
                config,
                policy,
                events: tx,
                next_id: AtomicU64::new(1),
                latest: AtomicU64::new(0),
                pending: Mutex::new(Vec::new()),
                live: Mutex::new(None),
            }),
        };
        (engine, EngineEvents { rx })
    }

    /// The handle currently bound to the sink
    pub fn live_handle(&self) -> Option<EngineHandle> {
        self.inner.live.lock().as_ref().map(|live| live.handle.clone())
    }

    /// Attaches still loading playlists
    pub fn pending_attaches(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Whether `handle` is the one bound to the sink
    pub fn is_live(&self, handle: &EngineHandle) -> bool {
        self.inner
            .live
            .lock()
            .as_ref()
            .is_some_and(|live| live.handle.id == handle.id)
    }

    /// Bind `endpoint` to the sink for `generation`.
    ///
    /// Any handle from an older generation is detached first. If a newer
    /// generation attaches (or [`supersede`](Self::supersede) is called)
    /// while this one is still loading playlists, this returns
    /// [`EngineError::Superseded`] without touching the sink.
    pub async fn attach(
        &self,
        endpoint: &StreamEndpoint,
        generation: u64,
    ) -> Result<EngineHandle, EngineError> {
        let inner = &self.inner;
        inner.latest.fetch_max(generation, Ordering::SeqCst);
        if inner.latest.load(Ordering::SeqCst) > generation {
            return Err(EngineError::Superseded { generation });
        }

        inner.detach_older_than(generation);

        let mode = self.select_mode(endpoint)?;
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let handle = EngineHandle {
            id,
            generation,
            mode,
        };

        info!(
            generation,
            mode = ?mode,
            tier = ?endpoint.tier,
            url = %endpoint.redacted_url(),
            "Attaching stream"
        );

        let source = match mode {
            PlaybackMode::Direct | PlaybackMode::Native => DriverSource::Url(endpoint.url.clone()),
            PlaybackMode::Software => {
                let guard = PendingGuard::register(
                    &inner.pending,
                    Pending {
                        id,
                        generation,
                        cancel: cancel.clone(),
                    },
                );
                let loaded = hls::load_media_playlist(
                    &inner.http,
                    &endpoint.url,
                    &inner.config.manifest,
                    inner.config.max_bandwidth,
                    &cancel,
                )
                .await;
                drop(guard);

                match loaded {
                    Ok((playlist, codecs)) => DriverSource::Segments {
                        playlist: Arc::new(playlist),
                        codecs,
                    },
                    Err(LoadError::Fetch(FetchError::Cancelled)) => {
                        debug!(generation, "Manifest load cancelled");
                        return Err(EngineError::Superseded { generation });
                    }
                    Err(e) => {
                        error!(generation, error = %e, "Manifest load failed");
                        return Err(EngineError::UnrecoverablePlaybackError(e.to_string()));
                    }
                }
            }
        };

        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let (controls_tx, controls_rx) = mpsc::unbounded_channel();
        let reporter = SinkReporter::new(generation, media_tx);

        {
            let mut live = inner.live.lock();
            if cancel.is_cancelled() || inner.latest.load(Ordering::SeqCst) > generation {
                debug!(generation, "Attach superseded before install");
                return Err(EngineError::Superseded { generation });
            }
            if let Some(previous) = live.take() {
                inner.teardown(previous, "replaced by newer attach");
            }

            inner
                .sink
                .load(source.sink_source(), reporter.clone())
                .map_err(|e| match e {
                    SinkError::Rejected(detail) => EngineError::UnsupportedPlaybackFormat(detail),
                    other => EngineError::UnrecoverablePlaybackError(other.to_string()),
                })?;

            *live = Some(Live {
                handle: handle.clone(),
                cancel: cancel.clone(),
                controls: controls_tx,
                playing: false,
            });
        }

        let driver = Driver::new(
            Arc::clone(inner),
            handle.clone(),
            cancel,
            source,
            reporter,
            media_rx,
            controls_rx,
        );
        tokio::spawn(driver.run());

        Ok(handle)
    }

    fn select_mode(&self, endpoint: &StreamEndpoint) -> Result<PlaybackMode, EngineError> {
        let caps = self.inner.sink.capabilities();
        match endpoint.kind {
            StreamKind::Direct => Ok(PlaybackMode::Direct),
            StreamKind::Manifest if caps.native_adaptive => Ok(PlaybackMode::Native),
            StreamKind::Manifest if caps.media_source => Ok(PlaybackMode::Software),
            StreamKind::Manifest => Err(EngineError::UnsupportedPlaybackFormat(
                "HLS is not supported by this audio output".into(),
            )),
        }
    }

    /// Unbind `handle`. Idempotent; returns whether anything was torn down.
    pub fn detach(&self, handle: &EngineHandle) -> bool {
        self.inner.detach_id(handle.id, "detached")
    }

    /// Cancel in-flight attaches older than `generation` and make any later
    /// attempt to install them fail.
    pub fn supersede(&self, generation: u64) {
        self.inner.latest.fetch_max(generation, Ordering::SeqCst);
        for pending in self
            .inner
            .pending
            .lock()
            .iter()
            .filter(|p| p.generation < generation)
        {
            pending.cancel.cancel();
        }
    }

    /// Start output for `handle`.
    ///
    /// Fails with [`SinkError::Detached`] once `handle` is no longer live.
    pub fn play(&self, handle: &EngineHandle) -> Result<(), SinkError> {
        self.inner
            .with_live(handle.id, |live, sink| {
                sink.play()?;
                live.playing = true;
                Ok(())
            })
            .unwrap_or(Err(SinkError::Detached))
    }

    /// Pause output for `handle`.
    pub fn pause(&self, handle: &EngineHandle) {
        self.inner.with_live(handle.id, |live, sink| {
            sink.pause();
            live.playing = false;
        });
    }

    /// Move the playhead; in software mode loading restarts at the
    /// segment containing `position`.
    pub fn seek(&self, handle: &EngineHandle, position: Duration) {
        self.inner.with_live(handle.id, |live, sink| {
            sink.seek(position);
            let _ = live.controls.send(Control::Seek(position));
        });
    }

    /// Output level; applies whether or not anything is attached.
    pub fn set_volume(&self, level: f32) {
        self.inner.sink.set_volume(level);
    }
}

// =============================================================================
// Session driver
// =============================================================================

enum DriverSource {
    Url(Url),
    Segments {
        playlist: Arc<MediaPlaylist>,
        codecs: Option<String>,
    },
}

impl DriverSource {
    fn sink_source(&self) -> SinkSource {
        match self {
            DriverSource::Url(url) => SinkSource::Url(url.clone()),
            DriverSource::Segments { codecs, .. } => SinkSource::Segments {
                codecs: codecs.clone(),
            },
        }
    }
}

#[derive(Debug)]
enum LoaderEvent {
    Appended { epoch: u64, index: usize },
    Finished { epoch: u64 },
    Failed {
        epoch: u64,
        class: ErrorClass,
        detail: String,
    },
}

enum Flow {
    Continue,
    Stop,
}

struct Driver {
    inner: Arc<Inner>,
    handle: EngineHandle,
    cancel: CancellationToken,
    source: DriverSource,
    reporter: SinkReporter,
    media_rx: mpsc::UnboundedReceiver<MediaEvent>,
    controls_rx: mpsc::UnboundedReceiver<Control>,
    loader_tx: mpsc::UnboundedSender<LoaderEvent>,
    loader_rx: mpsc::UnboundedReceiver<LoaderEvent>,
    loader_cancel: Option<CancellationToken>,
    loader_epoch: u64,
    next_segment: usize,
    position: Duration,
    recovery: RecoveryState,
}

impl Driver {
    fn new(
        inner: Arc<Inner>,
        handle: EngineHandle,
        cancel: CancellationToken,
        source: DriverSource,
        reporter: SinkReporter,
        media_rx: mpsc::UnboundedReceiver<MediaEvent>,
        controls_rx: mpsc::UnboundedReceiver<Control>,
    ) -> Self {
        let (loader_tx, loader_rx) = mpsc::unbounded_channel();
        Self {
            inner,
            handle,
            cancel,
            source,
            reporter,
            media_rx,
            controls_rx,
            loader_tx,
            loader_rx,
            loader_cancel: None,
            loader_epoch: 0,
            next_segment: 0,
            position: Duration::ZERO,
            recovery: RecoveryState::default(),
        }
    }

    async fn run(mut self) {
        if let DriverSource::Segments { playlist, .. } = &self.source {
            if playlist.ended {
                self.emit(EngineEventKind::DurationKnown(playlist.duration()));
            }
            self.start_loader(0);
        }

        loop {
            let flow = tokio::select! {
                () = self.cancel.cancelled() => Flow::Stop,
                Some(event) = self.media_rx.recv() => self.on_media(event),
                Some(control) = self.controls_rx.recv() => self.on_control(control),
                Some(event) = self.loader_rx.recv() => self.on_loader(event),
            };
            if matches!(flow, Flow::Stop) {
                break;
            }
        }

        if let Some(loader) = self.loader_cancel.take() {
            loader.cancel();
        }
        debug!(generation = self.handle.generation, "Engine driver stopped");
    }

    fn emit(&self, kind: EngineEventKind) {
        self.inner.emit(self.handle.generation, kind);
    }

    fn on_media(&mut self, event: MediaEvent) -> Flow {
        match event {
            MediaEvent::TimeUpdate(position) => {
                if position > self.position {
                    self.recovery.progressed();
                }
                self.position = position;
                self.emit(EngineEventKind::TimeUpdate(position));
                Flow::Continue
            }
            MediaEvent::DurationKnown(duration) => {
                self.emit(EngineEventKind::DurationKnown(duration));
                Flow::Continue
            }
            MediaEvent::Ended => {
                info!(generation = self.handle.generation, "Media ended");
                self.emit(EngineEventKind::Ended);
                Flow::Continue
            }
            MediaEvent::Error {
                fatal: false,
                class,
                detail,
            } => {
                warn!(
                    generation = self.handle.generation,
                    class = ?class,
                    detail = %detail,
                    "Non-fatal playback error"
                );
                self.emit(EngineEventKind::Warning(detail));
                Flow::Continue
            }
            MediaEvent::Error {
                fatal: true,
                class,
                detail,
            } => self.recover(class, detail),
        }
    }

    fn on_control(&mut self, control: Control) -> Flow {
        match control {
            Control::Seek(position) => {
                self.position = position;
                if let DriverSource::Segments { playlist, .. } = &self.source {
                    let index = playlist.segment_at(position);
                    debug!(
                        generation = self.handle.generation,
                        segment = index,
                        "Restarting segment loader after seek"
                    );
                    self.next_segment = index;
                    self.start_loader(index);
                }
            }
        }
        Flow::Continue
    }

    fn on_loader(&mut self, event: LoaderEvent) -> Flow {
        match event {
            LoaderEvent::Appended { epoch, index } if epoch == self.loader_epoch => {
                self.next_segment = index + 1;
                self.recovery.progressed();
                Flow::Continue
            }
            LoaderEvent::Finished { epoch } if epoch == self.loader_epoch => {
                self.inner
                    .with_live(self.handle.id, |_, sink| sink.end_of_stream());
                Flow::Continue
            }
            LoaderEvent::Failed {
                epoch,
                class,
                detail,
            } if epoch == self.loader_epoch => self.recover(class, detail),
            // From a loader that was already replaced
            _ => Flow::Continue,
        }
    }

    fn recover(&mut self, class: ErrorClass, detail: String) -> Flow {
        let generation = self.handle.generation;
        match self.recovery.decide(&self.inner.policy, class) {
            RecoveryDecision::Restart => {
                warn!(generation, class = ?class, detail = %detail, "Fatal error, restarting load");
                self.restart_load()
            }
            RecoveryDecision::RecoverDecoder => {
                warn!(generation, detail = %detail, "Fatal media error, recovering decoder");
                let recovered = self
                    .inner
                    .with_live(self.handle.id, |_, sink| sink.recover_decoder());
                match recovered {
                    Some(Ok(())) => {
                        if matches!(self.source, DriverSource::Segments { .. }) {
                            self.start_loader(self.next_segment);
                        }
                        Flow::Continue
                    }
                    Some(Err(e)) => self.fail(format!("{detail}; decoder recovery failed: {e}")),
                    None => Flow::Stop,
                }
            }
            RecoveryDecision::Fail => self.fail(detail),
        }
    }

    fn restart_load(&mut self) -> Flow {
        match &self.source {
            DriverSource::Url(url) => {
                let position = self.position;
                let source = SinkSource::Url(url.clone());
                let reporter = self.reporter.clone();
                let reloaded = self.inner.with_live(self.handle.id, |live, sink| {
                    sink.load(source, reporter)?;
                    sink.seek(position);
                    if live.playing {
                        sink.play()?;
                    }
                    Ok::<(), SinkError>(())
                });
                match reloaded {
                    Some(Ok(())) => Flow::Continue,
                    Some(Err(e)) => self.fail(format!("restart failed: {e}")),
                    None => Flow::Stop,
                }
            }
            DriverSource::Segments { .. } => {
                self.start_loader(self.next_segment);
                Flow::Continue
            }
        }
    }

    fn fail(&mut self, detail: String) -> Flow {
        error!(
            generation = self.handle.generation,
            detail = %detail,
            "Unrecoverable playback error"
        );
        self.inner.detach_id(self.handle.id, "unrecoverable error");
        self.emit(EngineEventKind::Failed(
            EngineError::UnrecoverablePlaybackError(detail),
        ));
        Flow::Stop
    }

    fn start_loader(&mut self, from: usize) {
        let DriverSource::Segments { playlist, .. } = &self.source else {
            return;
        };

        if let Some(previous) = self.loader_cancel.take() {
            previous.cancel();
        }
        self.loader_epoch += 1;
        let cancel = self.cancel.child_token();
        self.loader_cancel = Some(cancel.clone());

        let loader = SegmentLoader {
            inner: Arc::clone(&self.inner),
            handle_id: self.handle.id,
            policy: self.inner.config.segment,
            playlist: Arc::clone(playlist),
            epoch: self.loader_epoch,
            events: self.loader_tx.clone(),
            cancel,
        };
        tokio::spawn(loader.run(from));
    }
}

// =============================================================================
// Segment loader
// =============================================================================

struct SegmentLoader {
    inner: Arc<Inner>,
    handle_id: u64,
    policy: LoadPolicy,
    playlist: Arc<MediaPlaylist>,
    epoch: u64,
    events: mpsc::UnboundedSender<LoaderEvent>,
    cancel: CancellationToken,
}

impl SegmentLoader {
    async fn run(self, from: usize) {
        if let Some(init) = self.playlist.init.clone() {
            if !self.load_one(&init, None).await {
                return;
            }
        }

        for (index, segment) in self.playlist.segments.iter().enumerate().skip(from) {
            if !self.load_one(&segment.uri, Some(index)).await {
                return;
            }
        }

        if !self.cancel.is_cancelled() {
            let _ = self.events.send(LoaderEvent::Finished { epoch: self.epoch });
        }
    }

    /// Fetch and append one segment; `false` stops the loader.
    async fn load_one(&self, url: &Url, index: Option<usize>) -> bool {
        let bytes = match hls::fetch_with_retry(&self.inner.http, url, &self.policy, &self.cancel)
            .await
        {
            Ok(bytes) => bytes,
            Err(FetchError::Cancelled) => return false,
            Err(e) => {
                self.report_failure(ErrorClass::Network, e.to_string());
                return false;
            }
        };

        match self.append(bytes) {
            Some(Ok(())) => {
                if let Some(index) = index {
                    let _ = self.events.send(LoaderEvent::Appended {
                        epoch: self.epoch,
                        index,
                    });
                }
                true
            }
            Some(Err(e)) => {
                self.report_failure(ErrorClass::MediaDecode, e.to_string());
                false
            }
            // Session gone
            None => false,
        }
    }

    /// Append under the live lock so a detach cannot interleave.
    fn append(&self, bytes: Bytes) -> Option<Result<(), SinkError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.inner
            .with_live(self.handle_id, |_, sink| sink.append_segment(bytes))
    }

    fn report_failure(&self, class: ErrorClass, detail: String) {
        let _ = self.events.send(LoaderEvent::Failed {
            epoch: self.epoch,
            class,
            detail,
        });
    }
}
