//! Shared fakes for the playback integration tests.
//!
//! - `FakeResolver`: scripted stream resolution with optional gates to hold a
//!   resolution open until the test releases it
//! - `RecordingSink`: an `AudioSink` that records every call and lets the
//!   test push media events back through the live reporter

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use soul_core::{ResolutionError, StreamEndpoint, StreamResolver, Track, TrackId, TrustTier};
use soul_playback::{
    AudioSink, MediaEvent, PlayerState, SinkCapabilities, SinkError, SinkReporter, SinkSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use url::Url;

// ============================================================================
// Tracks
// ============================================================================

pub fn track(id: &str) -> Track {
    Track::new(TrackId::new(id), format!("Title {id}"), "Test Artist")
        .with_duration(Duration::from_secs(180))
}

pub fn direct_url(id: &str) -> Url {
    Url::parse(&format!("https://d111.cloudfront.net/audio/{id}.mp3")).unwrap()
}

pub fn manifest_url(id: &str) -> Url {
    Url::parse(&format!("https://d111.cloudfront.net/hls/{id}/master.m3u8")).unwrap()
}

// ============================================================================
// Fake resolver
// ============================================================================

#[derive(Default)]
pub struct FakeResolver {
    responses: Mutex<HashMap<String, Result<StreamEndpoint, ResolutionError>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolve `id` to a direct CDN file
    pub fn serve(&self, id: &str) {
        self.serve_url(id, direct_url(id));
    }

    pub fn serve_url(&self, id: &str, url: Url) {
        self.responses
            .lock()
            .insert(id.to_string(), Ok(StreamEndpoint::new(url, TrustTier::Primary)));
    }

    pub fn fail(&self, id: &str, err: ResolutionError) {
        self.responses.lock().insert(id.to_string(), Err(err));
    }

    /// Hold resolution of `id` until the returned gate is notified
    pub fn gate(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    async fn resolve(&self, track_id: &TrackId) -> Result<StreamEndpoint, ResolutionError> {
        self.calls.lock().push(track_id.to_string());

        let gate = self.gates.lock().get(track_id.as_str()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .get(track_id.as_str())
            .cloned()
            .unwrap_or_else(|| Err(ResolutionError::NotFound(track_id.to_string())))
    }
}

// ============================================================================
// Recording sink
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Load(SinkSource),
    Append(usize),
    EndOfStream,
    RecoverDecoder,
    Reset,
    Play,
    Pause,
    Seek(Duration),
    Volume(f32),
}

pub struct RecordingSink {
    capabilities: SinkCapabilities,
    calls: Mutex<Vec<SinkCall>>,
    reporter: Mutex<Option<SinkReporter>>,
    refuse_play: AtomicBool,
    fail_recovery: AtomicBool,
    report_on_load: Mutex<Option<MediaEvent>>,
    volume_delay: Mutex<Option<Duration>>,
}

impl RecordingSink {
    pub fn with_capabilities(capabilities: SinkCapabilities) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            calls: Mutex::new(Vec::new()),
            reporter: Mutex::new(None),
            refuse_play: AtomicBool::new(false),
            fail_recovery: AtomicBool::new(false),
            report_on_load: Mutex::new(None),
            volume_delay: Mutex::new(None),
        })
    }

    /// Sink that plays HLS itself
    pub fn native() -> Arc<Self> {
        Self::with_capabilities(SinkCapabilities {
            native_adaptive: true,
            media_source: false,
        })
    }

    /// Sink that needs segments pushed into it
    pub fn media_source() -> Arc<Self> {
        Self::with_capabilities(SinkCapabilities {
            native_adaptive: false,
            media_source: true,
        })
    }

    /// Sink that only understands plain files
    pub fn basic() -> Arc<Self> {
        Self::with_capabilities(SinkCapabilities::default())
    }

    pub fn refuse_play(&self) {
        self.refuse_play.store(true, Ordering::SeqCst);
    }

    pub fn fail_recovery(&self) {
        self.fail_recovery.store(true, Ordering::SeqCst);
    }

    /// Report `event` from inside the next `load`, before attach returns
    pub fn report_on_load(&self, event: MediaEvent) {
        *self.report_on_load.lock() = Some(event);
    }

    /// Block the calling thread in `set_volume`, widening the window
    /// between attach and the first transport change
    pub fn slow_volume(&self, delay: Duration) {
        *self.volume_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&SinkCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn loaded_urls(&self) -> Vec<Url> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Load(SinkSource::Url(url)) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            SinkCall::Volume(level) => Some(*level),
            _ => None,
        })
    }

    /// Generation of the session currently bound, if any
    pub fn bound_generation(&self) -> Option<u64> {
        self.reporter.lock().as_ref().map(SinkReporter::generation)
    }

    /// Push a media event to the bound session
    pub fn report(&self, event: MediaEvent) -> bool {
        self.reporter
            .lock()
            .as_ref()
            .is_some_and(|reporter| reporter.report(event))
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().push(call);
    }
}

impl AudioSink for RecordingSink {
    fn capabilities(&self) -> SinkCapabilities {
        self.capabilities
    }

    fn load(&self, source: SinkSource, reporter: SinkReporter) -> Result<(), SinkError> {
        self.record(SinkCall::Load(source));
        if let Some(event) = self.report_on_load.lock().take() {
            reporter.report(event);
        }
        *self.reporter.lock() = Some(reporter);
        Ok(())
    }

    fn append_segment(&self, data: Bytes) -> Result<(), SinkError> {
        self.record(SinkCall::Append(data.len()));
        Ok(())
    }

    fn end_of_stream(&self) {
        self.record(SinkCall::EndOfStream);
    }

    fn recover_decoder(&self) -> Result<(), SinkError> {
        self.record(SinkCall::RecoverDecoder);
        if self.fail_recovery.load(Ordering::SeqCst) {
            return Err(SinkError::Decode("decoder wedged".into()));
        }
        Ok(())
    }

    fn reset(&self) {
        self.record(SinkCall::Reset);
        *self.reporter.lock() = None;
    }

    fn play(&self) -> Result<(), SinkError> {
        if self.refuse_play.load(Ordering::SeqCst) {
            return Err(SinkError::NotAllowed("user gesture required".into()));
        }
        self.record(SinkCall::Play);
        Ok(())
    }

    fn pause(&self) {
        self.record(SinkCall::Pause);
    }

    fn seek(&self, position: Duration) {
        self.record(SinkCall::Seek(position));
    }

    fn set_volume(&self, level: f32) {
        let delay = *self.volume_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.record(SinkCall::Volume(level));
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Wait (bounded) until the watched state satisfies `predicate`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<PlayerState>,
    predicate: impl FnMut(&PlayerState) -> bool,
) -> PlayerState {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for player state")
        .expect("player dropped")
        .clone()
}

/// Wait (bounded) until `condition` holds, polling.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
