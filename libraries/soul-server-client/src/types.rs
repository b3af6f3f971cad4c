//! Types for Soul Player streaming API requests and responses.

use crate::trust::TrustPolicy;
use serde::{Deserialize, Serialize};
use soul_core::{CoverArt, Track, TrackId};
use std::time::Duration;

/// Default backend used by local development setups.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1";

/// Configuration for connecting to the streaming API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the API, including any version prefix
    /// (e.g., "https://api.example.com/api/v1")
    pub url: String,
    /// Bearer token sent with every request, if the session has one
    pub access_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Which stream URL origins may be handed to the playback engine
    pub trust: TrustPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            access_token: None,
            timeout_secs: 15,
            connect_timeout_secs: 5,
            trust: TrustPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new server config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a config with an existing token.
    pub fn with_token(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::new(url)
        }
    }

    /// Replace the trust policy.
    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// =============================================================================
// Stream Types
// =============================================================================

/// Body of `GET /tracks/{id}/stream`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUrlBody {
    #[serde(default, alias = "url")]
    pub stream_url: Option<String>,
}

/// The backend answers either bare or wrapped in `{ success, data }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum StreamUrlEnvelope {
    Wrapped { data: StreamUrlBody },
    Bare(StreamUrlBody),
}

impl StreamUrlEnvelope {
    /// The non-empty stream URL, if any.
    pub(crate) fn into_stream_url(self) -> Option<String> {
        let body = match self {
            StreamUrlEnvelope::Wrapped { data } => data,
            StreamUrlEnvelope::Bare(body) => body,
        };
        body.stream_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
    }
}

/// Error body the API sends alongside failure statuses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Library Types
// =============================================================================

/// Query parameters for `GET /tracks`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A song or episode record exactly as the API returns it.
///
/// Different endpoints spell the same fields differently; [`ServerTrack::normalize`]
/// folds the variants into one [`Track`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTrack {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub artist: Option<String>,
    pub host: Option<String>,
    pub cover_image_url: Option<String>,
    pub cover_image: Option<String>,
    pub cover_url: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    /// Seconds
    pub resume_position: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ServerTrack {
    /// Fold field-name variants into a [`Track`]. Returns `None` when the
    /// record has no usable identifier.
    pub fn normalize(self) -> Option<Track> {
        let id = self
            .mongo_id
            .into_iter()
            .chain(self.id)
            .map(TrackId::new)
            .find(TrackId::is_usable)?;

        let is_episode = self
            .kind
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("episode"))
            || (self.artist.is_none() && self.host.is_some());

        let artist = self.artist.or(self.host).unwrap_or_default();
        let mut track = Track::new(id, self.title, artist);
        if is_episode {
            track = track.episode();
        }

        if let Some(secs) = self.duration.and_then(seconds) {
            track = track.with_duration(secs);
        }
        if let Some(secs) = self.resume_position.and_then(seconds) {
            track = track.with_resume_position(secs);
        }

        let cover = [self.cover_image_url, self.cover_image, self.cover_url]
            .into_iter()
            .flatten()
            .find(|reference| !reference.trim().is_empty());
        if let Some(reference) = cover {
            track = track.with_cover(CoverArt::from_reference(reference));
        }

        Some(track)
    }
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
}

/// `GET /tracks` answers either a bare list or `{ success, data: [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum TrackListEnvelope {
    Wrapped { data: Vec<ServerTrack> },
    Bare(Vec<ServerTrack>),
}

impl TrackListEnvelope {
    pub(crate) fn into_records(self) -> Vec<ServerTrack> {
        match self {
            TrackListEnvelope::Wrapped { data } => data,
            TrackListEnvelope::Bare(records) => records,
        }
    }
}

// =============================================================================
// Health Types
// =============================================================================

/// Result of the backend health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: u16,
    /// Free-form body for display
    pub body: String,
}
