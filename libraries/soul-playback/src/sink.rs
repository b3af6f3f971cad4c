//! Audio sink abstraction
//!
//! The sink is the single audio output the player drives (a browser media
//! element, a native player, a headless recorder in tests). Only the engine
//! writes to it. Media events flow back through the [`SinkReporter`] handed
//! over at [`AudioSink::load`] time; once the engine detaches, that reporter
//! goes dead and late events are dropped.

use crate::error::SinkError;
use crate::recovery::ErrorClass;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// What the sink can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkCapabilities {
    /// Plays HLS manifests given a URL
    pub native_adaptive: bool,
    /// Accepts media segments pushed via [`AudioSink::append_segment`]
    pub media_source: bool,
}

/// What to load into the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSource {
    /// The sink fetches and plays this URL itself
    Url(Url),
    /// The engine pushes segments; `codecs` comes from the manifest when known
    Segments {
        /// Codec string from the variant, if any
        codecs: Option<String>,
    },
}

/// Events a sink reports about the loaded media
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Playhead moved
    TimeUpdate(Duration),
    /// Media duration became known
    DurationKnown(Duration),
    /// Reached the end of the media
    Ended,
    /// Pipeline error; non-fatal errors are informational
    Error {
        /// Error class
        class: ErrorClass,
        /// Whether playback stopped
        fatal: bool,
        /// Description
        detail: String,
    },
}

/// Channel back to the engine session that loaded the sink
#[derive(Debug, Clone)]
pub struct SinkReporter {
    generation: u64,
    tx: mpsc::UnboundedSender<MediaEvent>,
}

impl SinkReporter {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<MediaEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the session this reporter belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; returns `false` once the session is gone.
    pub fn report(&self, event: MediaEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the session is still listening
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// The shared audio output.
///
/// Every method is synchronous: implementations queue work on their own
/// runtime and report outcomes through the [`SinkReporter`].
pub trait AudioSink: Send + Sync {
    /// What this sink can play
    fn capabilities(&self) -> SinkCapabilities;

    /// Bind a new source, replacing whatever was loaded.
    fn load(&self, source: SinkSource, reporter: SinkReporter) -> Result<(), SinkError>;

    /// Buffer one media segment (only after loading [`SinkSource::Segments`])
    fn append_segment(&self, data: Bytes) -> Result<(), SinkError>;

    /// No more segments will be appended
    fn end_of_stream(&self) {}

    /// Try to recover the decoder in place after a decode error
    fn recover_decoder(&self) -> Result<(), SinkError>;

    /// Unload everything and stop output
    fn reset(&self);

    /// Start or resume output
    fn play(&self) -> Result<(), SinkError>;

    /// Pause output
    fn pause(&self);

    /// Move the playhead
    fn seek(&self, position: Duration);

    /// Output level, 0.0-1.0
    fn set_volume(&self, level: f32);
}
