/// Headless audio sink that counts what the engine feeds it
use bytes::Bytes;
use parking_lot::Mutex;
use soul_playback::{AudioSink, SinkCapabilities, SinkError, SinkReporter, SinkSource};
use std::time::Duration;

/// What reached the sink since the last load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub loads: usize,
    pub source: Option<SinkSource>,
    pub segments: usize,
    pub bytes: u64,
    pub finished: bool,
    pub playing: bool,
}

/// Accepts segments without decoding them.
///
/// Claims media-source support only, so manifests always take the software
/// path and every segment is actually downloaded.
#[derive(Debug, Default)]
pub struct CountingSink {
    stats: Mutex<SinkStats>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SinkStats {
        self.stats.lock().clone()
    }
}

impl AudioSink for CountingSink {
    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            native_adaptive: false,
            media_source: true,
        }
    }

    // Nothing is decoded, so there are no media events to report
    fn load(&self, source: SinkSource, _reporter: SinkReporter) -> Result<(), SinkError> {
        let mut stats = self.stats.lock();
        *stats = SinkStats {
            loads: stats.loads + 1,
            source: Some(source),
            ..SinkStats::default()
        };
        Ok(())
    }

    fn append_segment(&self, data: Bytes) -> Result<(), SinkError> {
        if data.is_empty() {
            return Err(SinkError::Decode("empty segment".into()));
        }
        let mut stats = self.stats.lock();
        stats.segments += 1;
        stats.bytes += data.len() as u64;
        Ok(())
    }

    fn end_of_stream(&self) {
        self.stats.lock().finished = true;
    }

    fn recover_decoder(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn reset(&self) {
        let mut stats = self.stats.lock();
        stats.source = None;
        stats.playing = false;
    }

    fn play(&self) -> Result<(), SinkError> {
        self.stats.lock().playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.stats.lock().playing = false;
    }

    fn seek(&self, _position: Duration) {}

    fn set_volume(&self, _level: f32) {}
}
