/// Stream endpoint types
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Trust classification of a stream URL's origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustTier {
    /// First-party streaming edge / CDN
    Primary,

    /// Object-storage URL, acceptable fallback
    DirectStorage,

    /// Same-origin or loopback proxy, development only
    LocalDevProxy,
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrustTier::Primary => "primary",
            TrustTier::DirectStorage => "direct-storage",
            TrustTier::LocalDevProxy => "local-dev-proxy",
        };
        f.write_str(name)
    }
}

/// What the URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Adaptive-bitrate manifest (HLS playlist)
    Manifest,

    /// A single media file the sink can play directly
    Direct,
}

impl StreamKind {
    /// Classify by the URL path extension
    pub fn from_url(url: &Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".m3u8") || path.ends_with(".m3u") {
            StreamKind::Manifest
        } else {
            StreamKind::Direct
        }
    }
}

/// A validated, playable stream URL
///
/// Only produced by a [`crate::StreamResolver`] after origin validation.
/// Signed URLs are time-limited, so an endpoint belongs to the playback
/// session it was resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEndpoint {
    /// The stream URL
    pub url: Url,

    /// Trust tier the URL's origin matched
    pub tier: TrustTier,

    /// Manifest or direct media
    pub kind: StreamKind,
}

impl StreamEndpoint {
    /// Create an endpoint, classifying its kind from the URL
    pub fn new(url: Url, tier: TrustTier) -> Self {
        let kind = StreamKind::from_url(&url);
        Self { url, tier, kind }
    }

    /// URL truncated for logs; signatures stay out of log files
    pub fn redacted_url(&self) -> String {
        self.url.as_str().chars().take(80).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_manifest_urls() {
        let url = Url::parse("https://d1.cloudfront.net/hls/abc/master.m3u8?Sig=x").unwrap();
        assert_eq!(StreamKind::from_url(&url), StreamKind::Manifest);

        let url = Url::parse("https://bucket.s3.amazonaws.com/songs/abc.mp3").unwrap();
        assert_eq!(StreamKind::from_url(&url), StreamKind::Direct);
    }

    #[test]
    fn tier_serializes_kebab_case() {
        let json = serde_json::to_string(&TrustTier::LocalDevProxy).unwrap();
        assert_eq!(json, "\"local-dev-proxy\"");
        assert_eq!(TrustTier::DirectStorage.to_string(), "direct-storage");
    }

    #[test]
    fn redacted_url_is_bounded() {
        let long = format!("https://d1.cloudfront.net/{}.m3u8", "a".repeat(200));
        let endpoint = StreamEndpoint::new(Url::parse(&long).unwrap(), TrustTier::Primary);
        assert_eq!(endpoint.redacted_url().chars().count(), 80);
    }
}
