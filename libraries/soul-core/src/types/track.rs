/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether the playable unit is a song or a podcast episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    /// Music track
    Song,

    /// Podcast episode
    Episode,
}

/// Where the cover art comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverArt {
    /// Absolute URL
    Url(String),

    /// Opaque object-storage key, resolved by the presentation layer
    StorageKey(String),
}

impl CoverArt {
    /// Classify a raw reference: anything with a scheme is a URL
    pub fn from_reference(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        if reference.starts_with("http://")
            || reference.starts_with("https://")
            || reference.starts_with("data:")
        {
            CoverArt::Url(reference)
        } else {
            CoverArt::StorageKey(reference)
        }
    }
}

/// A playable unit, normalized at the data-fetch boundary
///
/// The player only reads tracks; it never changes identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track or episode title
    pub title: String,

    /// Artist name, or the host for episodes
    pub artist: String,

    /// Song or episode
    pub kind: TrackKind,

    /// Advisory duration; the media pipeline's value wins once known
    pub duration: Duration,

    /// Cover art reference
    pub cover: Option<CoverArt>,

    /// Where to resume an episode from
    pub resume_position: Option<Duration>,
}

impl Track {
    /// Create a new song with minimal metadata
    pub fn new(id: TrackId, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            kind: TrackKind::Song,
            duration: Duration::ZERO,
            cover: None,
            resume_position: None,
        }
    }

    /// Mark as a podcast episode
    pub fn episode(mut self) -> Self {
        self.kind = TrackKind::Episode;
        self
    }

    /// Set the advisory duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the cover art
    pub fn with_cover(mut self, cover: CoverArt) -> Self {
        self.cover = Some(cover);
        self
    }

    /// Set the resume offset
    pub fn with_resume_position(mut self, position: Duration) -> Self {
        self.resume_position = Some(position);
        self
    }
}
