//! Stream URL origin validation.
//!
//! The backend hands out signed URLs on a handful of known origins. Anything
//! else is rejected before it can reach the playback engine, so a
//! misconfigured or compromised backend cannot point the player at an
//! arbitrary host.
//!
//! Host patterns are matched label by label:
//! - a leading `*` matches one or more labels (`*.cloudfront.net`)
//! - any other `*` matches exactly one label (`s3.*.amazonaws.com`)
//! - everything else must match exactly (case-insensitive)

use serde::{Deserialize, Serialize};
use soul_core::{ResolutionError, StreamEndpoint, TrustTier};
use url::Url;

/// One acceptable origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRule {
    /// Tier assigned to URLs matching this rule
    pub tier: TrustTier,
    /// Host pattern (see module docs)
    pub host: String,
    /// Reject plain `http` URLs for this rule
    #[serde(default)]
    pub require_https: bool,
}

impl TrustRule {
    /// Rule that only accepts `https`.
    pub fn https(tier: TrustTier, host: impl Into<String>) -> Self {
        Self {
            tier,
            host: host.into(),
            require_https: true,
        }
    }

    /// Rule that accepts `http` and `https`.
    pub fn any_scheme(tier: TrustTier, host: impl Into<String>) -> Self {
        Self {
            tier,
            host: host.into(),
            require_https: false,
        }
    }

    fn matches(&self, url: &Url, host: &str) -> bool {
        if self.require_https && url.scheme() != "https" {
            return false;
        }
        host_matches(&self.host, host)
    }
}

/// Ordered list of acceptable origins; first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub rules: Vec<TrustRule>,
}

impl Default for TrustPolicy {
    /// CloudFront edge, S3 object storage, loopback dev proxy.
    fn default() -> Self {
        Self {
            rules: vec![
                TrustRule::https(TrustTier::Primary, "*.cloudfront.net"),
                TrustRule::https(TrustTier::DirectStorage, "s3.amazonaws.com"),
                TrustRule::https(TrustTier::DirectStorage, "*.s3.amazonaws.com"),
                TrustRule::https(TrustTier::DirectStorage, "s3.*.amazonaws.com"),
                TrustRule::https(TrustTier::DirectStorage, "*.s3.*.amazonaws.com"),
                TrustRule::any_scheme(TrustTier::LocalDevProxy, "localhost"),
                TrustRule::any_scheme(TrustTier::LocalDevProxy, "127.0.0.1"),
                TrustRule::any_scheme(TrustTier::LocalDevProxy, "[::1]"),
            ],
        }
    }
}

impl TrustPolicy {
    /// Policy that trusts nothing.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule (lowest priority).
    pub fn with_rule(mut self, rule: TrustRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Drop every rule of the given tier, e.g. the dev proxy in production.
    pub fn without_tier(mut self, tier: TrustTier) -> Self {
        self.rules.retain(|rule| rule.tier != tier);
        self
    }

    /// Tier of the first matching rule.
    pub fn classify(&self, url: &Url) -> Option<TrustTier> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        self.rules
            .iter()
            .find(|rule| rule.matches(url, host))
            .map(|rule| rule.tier)
    }

    /// Parse and classify a raw URL, failing closed.
    pub fn validate(&self, raw: &str) -> Result<StreamEndpoint, ResolutionError> {
        let untrusted = || ResolutionError::UntrustedOrigin(redact(raw));

        let url = Url::parse(raw).map_err(|_| untrusted())?;
        let tier = self.classify(&url).ok_or_else(untrusted)?;
        Ok(StreamEndpoint::new(url, tier))
    }
}

/// Signed URLs must not end up in logs or error messages verbatim.
fn redact(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        ),
        Err(_) => raw.chars().take(80).collect(),
    }
}

fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let pattern_labels: Vec<&str> = pattern.split('.').collect();
    let host_labels: Vec<&str> = host.split('.').collect();

    match pattern_labels.split_first() {
        Some((&"*", rest)) => {
            host_labels.len() > rest.len()
                && labels_match(rest, &host_labels[host_labels.len() - rest.len()..])
        }
        _ => labels_match(&pattern_labels, &host_labels),
    }
}

fn labels_match(pattern: &[&str], host: &[&str]) -> bool {
    pattern.len() == host.len()
        && pattern
            .iter()
            .zip(host)
            .all(|(p, h)| *p == "*" || p == h)
}
