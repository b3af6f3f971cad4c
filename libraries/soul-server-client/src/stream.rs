//! Stream URL resolution.

use crate::trust::TrustPolicy;
use crate::types::{ApiError, StreamUrlEnvelope};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use soul_core::{ResolutionError, StreamEndpoint, StreamResolver, TrackId, TrustTier};
use tracing::{debug, info, warn};
use url::Url;

/// Asks the backend for a track's stream URL and validates its origin.
///
/// One request per call, no retries. Every failure is reported as a
/// distinct [`ResolutionError`] kind.
#[derive(Debug, Clone)]
pub struct StreamUrlResolver {
    http: Client,
    base_url: Url,
    access_token: Option<String>,
    trust: TrustPolicy,
}

impl StreamUrlResolver {
    pub(crate) fn new(
        http: Client,
        base_url: Url,
        access_token: Option<String>,
        trust: TrustPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            access_token,
            trust,
        }
    }

    /// The policy applied to returned URLs.
    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }

    /// Resolve a raw identifier.
    pub async fn resolve_id(&self, track_id: &str) -> Result<StreamEndpoint, ResolutionError> {
        let id = TrackId::new(track_id);
        if !id.is_usable() {
            warn!(track_id = %track_id, "Rejecting placeholder track id");
            return Err(ResolutionError::InvalidIdentifier(track_id.to_string()));
        }

        let url = self.stream_url_for(&id)?;
        debug!(url = %url, track_id = %id, "Fetching stream URL");

        let mut request = self.http.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolutionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &id, &body));
        }

        let envelope: StreamUrlEnvelope = response.json().await.map_err(|e| {
            ResolutionError::service_unavailable(
                Some(status.as_u16()),
                format!("Failed to parse stream URL response: {}", e),
            )
        })?;

        let raw = envelope.into_stream_url().ok_or_else(|| {
            ResolutionError::service_unavailable(Some(status.as_u16()), "No stream URL returned")
        })?;

        let endpoint = self.trust.validate(&raw).map_err(|e| {
            warn!(track_id = %id, error = %e, "Rejected stream URL");
            e
        })?;

        match endpoint.tier {
            TrustTier::Primary => {
                info!(track_id = %id, url = %endpoint.redacted_url(), "CDN stream URL validated");
            }
            TrustTier::DirectStorage => {
                warn!(
                    track_id = %id,
                    url = %endpoint.redacted_url(),
                    "Using object-storage URL (fallback); configure the CDN for production"
                );
            }
            TrustTier::LocalDevProxy => {
                info!(track_id = %id, url = %endpoint.redacted_url(), "Using local backend proxy");
            }
        }

        Ok(endpoint)
    }

    fn stream_url_for(&self, id: &TrackId) -> Result<Url, ResolutionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ResolutionError::service_unavailable(None, "API base URL cannot carry a path")
            })?
            .pop_if_empty()
            .extend(["tracks", id.as_str(), "stream"]);
        Ok(url)
    }
}

#[async_trait]
impl StreamResolver for StreamUrlResolver {
    async fn resolve(&self, track_id: &TrackId) -> Result<StreamEndpoint, ResolutionError> {
        self.resolve_id(track_id.as_str()).await
    }
}

fn classify_failure(status: StatusCode, id: &TrackId, body: &str) -> ResolutionError {
    match status {
        StatusCode::BAD_REQUEST => ResolutionError::InvalidIdentifier(id.to_string()),
        StatusCode::NOT_FOUND => ResolutionError::NotFound(id.to_string()),
        StatusCode::UNPROCESSABLE_ENTITY => ResolutionError::StreamUnavailable(id.to_string()),
        _ => {
            let message = serde_json::from_str::<ApiError>(body)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or_else(|| body.chars().take(200).collect());
            ResolutionError::service_unavailable(Some(status.as_u16()), message)
        }
    }
}
