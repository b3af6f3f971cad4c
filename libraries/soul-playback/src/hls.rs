//! HLS playlist parsing and loading
//!
//! Just enough of RFC 8216 for VOD audio: master playlists (variants with
//! bandwidth and codecs), media playlists (segment list, optional init
//! segment, end marker). Encryption and live refresh are not handled.

use crate::types::LoadPolicy;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Playlist parse failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    /// First line is not `#EXTM3U`
    #[error("Not an HLS playlist")]
    NotAPlaylist,

    /// A URI line could not be resolved against the playlist URL
    #[error("Invalid URI in playlist: {0}")]
    InvalidUri(String),

    /// A master playlist without variants or a media playlist without segments
    #[error("Playlist is empty")]
    Empty,
}

/// Loader failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Every attempt failed
    #[error("{url} failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Redacted URL
        url: String,
        /// Attempts made
        attempts: u32,
        /// Last failure
        last: String,
    },

    /// The owning session was torn down
    #[error("Cancelled")]
    Cancelled,
}

/// One entry of a master playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Media playlist URL
    pub uri: Url,
    /// `BANDWIDTH` attribute, bits per second
    pub bandwidth: Option<u64>,
    /// `CODECS` attribute
    pub codecs: Option<String>,
}

/// One media segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment URL
    pub uri: Url,
    /// Offset of the segment start within the media
    pub start: Duration,
    /// `#EXTINF` duration
    pub duration: Duration,
}

/// A parsed media playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaylist {
    /// `#EXT-X-MAP` initialisation segment
    pub init: Option<Url>,
    /// Segments in playback order
    pub segments: Vec<Segment>,
    /// `#EXT-X-ENDLIST` was present
    pub ended: bool,
}

impl MediaPlaylist {
    /// Sum of segment durations
    pub fn duration(&self) -> Duration {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Index of the segment containing `position` (last segment past the end)
    pub fn segment_at(&self, position: Duration) -> usize {
        self.segments
            .iter()
            .position(|s| position < s.start + s.duration)
            .unwrap_or_else(|| self.segments.len().saturating_sub(1))
    }
}

/// Either kind of playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playlist {
    /// Variant list
    Master(Vec<Variant>),
    /// Segment list
    Media(MediaPlaylist),
}

/// Parse a playlist fetched from `base`.
pub fn parse(base: &Url, text: &str) -> Result<Playlist, ManifestError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    if lines.next() != Some("#EXTM3U") {
        return Err(ManifestError::NotAPlaylist);
    }

    let mut variants = Vec::new();
    let mut segments = Vec::new();
    let mut init = None;
    let mut ended = false;
    let mut is_master = false;

    let mut pending_variant: Option<(Option<u64>, Option<String>)> = None;
    let mut pending_duration: Option<Duration> = None;
    let mut elapsed = Duration::ZERO;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            is_master = true;
            pending_variant = Some((
                attribute(attrs, "BANDWIDTH").and_then(|b| b.parse().ok()),
                attribute(attrs, "CODECS"),
            ));
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let secs = rest.split(',').next().unwrap_or_default().trim();
            pending_duration = secs
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64);
        } else if let Some(attrs) = line.strip_prefix("#EXT-X-MAP:") {
            if let Some(uri) = attribute(attrs, "URI") {
                init = Some(resolve(base, &uri)?);
            }
        } else if line == "#EXT-X-ENDLIST" {
            ended = true;
        } else if line.starts_with('#') {
            // Unhandled tag
        } else if let Some((bandwidth, codecs)) = pending_variant.take() {
            variants.push(Variant {
                uri: resolve(base, line)?,
                bandwidth,
                codecs,
            });
        } else {
            let duration = pending_duration.take().unwrap_or_default();
            segments.push(Segment {
                uri: resolve(base, line)?,
                start: elapsed,
                duration,
            });
            elapsed += duration;
        }
    }

    if is_master {
        if variants.is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(Playlist::Master(variants))
    } else {
        if segments.is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(Playlist::Media(MediaPlaylist {
            init,
            segments,
            ended,
        }))
    }
}

fn resolve(base: &Url, reference: &str) -> Result<Url, ManifestError> {
    base.join(reference)
        .map_err(|_| ManifestError::InvalidUri(reference.chars().take(80).collect()))
}

/// Read `NAME=value` or `NAME="value"` from an attribute list.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    let mut rest = attrs;
    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=')?;
        let (value, tail) = if let Some(quoted) = after_key.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], quoted[end + 1..].trim_start_matches(','))
        } else {
            match after_key.split_once(',') {
                Some((value, tail)) => (value, tail),
                None => (after_key, ""),
            }
        };
        if key.trim() == name {
            return Some(value.to_string());
        }
        rest = tail;
    }
    None
}

/// Highest-bandwidth variant within `cap`, else the lowest one.
pub fn select_variant(variants: &[Variant], cap: Option<u64>) -> Option<&Variant> {
    let bandwidth = |v: &&Variant| v.bandwidth.unwrap_or(0);
    variants
        .iter()
        .filter(|v| cap.map_or(true, |cap| v.bandwidth.unwrap_or(0) <= cap))
        .max_by_key(bandwidth)
        .or_else(|| variants.iter().min_by_key(bandwidth))
}

/// GET `url` with a per-attempt timeout and bounded retries.
///
/// Cancellation wins over any in-flight attempt or retry delay.
pub async fn fetch_with_retry(
    http: &Client,
    url: &Url,
    policy: &LoadPolicy,
    cancel: &CancellationToken,
) -> Result<Bytes, FetchError> {
    let attempts = policy.max_retries.saturating_add(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        let result = tokio::select! {
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = fetch_once(http, url, policy.timeout()) => result,
        };

        match result {
            Ok(bytes) => {
                debug!(url = %redact(url), attempt, bytes = bytes.len(), "Fetched");
                return Ok(bytes);
            }
            Err(e) => {
                warn!(url = %redact(url), attempt, attempts, error = %e, "Fetch failed");
                last = e;
            }
        }

        if attempt < attempts {
            tokio::select! {
                () = cancel.cancelled() => return Err(FetchError::Cancelled),
                () = tokio::time::sleep(policy.retry_delay()) => {}
            }
        }
    }

    Err(FetchError::Exhausted {
        url: redact(url),
        attempts,
        last,
    })
}

async fn fetch_once(http: &Client, url: &Url, timeout: Duration) -> Result<Bytes, String> {
    let response = http
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    response.bytes().await.map_err(|e| e.to_string())
}

/// Load a manifest URL down to a media playlist, following one level of
/// master playlist.
pub async fn load_media_playlist(
    http: &Client,
    url: &Url,
    policy: &LoadPolicy,
    max_bandwidth: Option<u64>,
    cancel: &CancellationToken,
) -> Result<(MediaPlaylist, Option<String>), LoadError> {
    match fetch_playlist(http, url, policy, cancel).await? {
        Playlist::Media(media) => Ok((media, None)),
        Playlist::Master(variants) => {
            let variant = select_variant(&variants, max_bandwidth).ok_or(ManifestError::Empty)?;
            debug!(
                bandwidth = ?variant.bandwidth,
                codecs = ?variant.codecs,
                variants = variants.len(),
                "Selected variant"
            );
            match fetch_playlist(http, &variant.uri, policy, cancel).await? {
                Playlist::Media(media) => Ok((media, variant.codecs.clone())),
                Playlist::Master(_) => Err(LoadError::Manifest(ManifestError::NotAPlaylist)),
            }
        }
    }
}

async fn fetch_playlist(
    http: &Client,
    url: &Url,
    policy: &LoadPolicy,
    cancel: &CancellationToken,
) -> Result<Playlist, LoadError> {
    let body = fetch_with_retry(http, url, policy, cancel).await?;
    let text = String::from_utf8_lossy(&body);
    Ok(parse(url, &text)?)
}

/// Failure loading a playlist
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// Transport failure
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Body was not a usable playlist
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Signed query strings stay out of logs.
pub(crate) fn redact(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
    .chars()
    .take(80)
    .collect()
}
