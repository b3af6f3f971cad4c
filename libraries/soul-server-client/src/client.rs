//! Main Soul Player streaming API client.

use crate::error::{Result, ServerClientError};
use crate::library::{join, LibraryClient};
use crate::stream::StreamUrlResolver;
use crate::types::{HealthStatus, ServerConfig, TrackQuery};
use reqwest::Client;
use soul_core::Track;
use tracing::{debug, info};
use url::Url;

/// Client for the streaming API.
///
/// Owns one pooled HTTP client shared by the library calls and every
/// [`StreamUrlResolver`] handed out by [`SoulServerClient::resolver`].
///
/// # Example
///
/// ```ignore
/// use soul_server_client::{ServerConfig, SoulServerClient, TrackQuery};
///
/// let client = SoulServerClient::new(ServerConfig::new("http://localhost:5000/api/v1"))?;
/// let tracks = client.list_tracks(&TrackQuery::default()).await?;
/// let endpoint = client.resolver().resolve_id(tracks[0].id.as_str()).await?;
/// println!("{} ({})", endpoint.redacted_url(), endpoint.tier);
/// ```
#[derive(Debug, Clone)]
pub struct SoulServerClient {
    http: Client,
    base_url: Url,
    config: ServerConfig,
}

impl SoulServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let raw = config.url.trim();
        if raw.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }
        if !raw.starts_with("http://") && !raw.starts_with("https://") {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let base_url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;
        if base_url.host_str().is_none() {
            return Err(ServerClientError::InvalidUrl("URL has no host".into()));
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(format!("SoulPlayer/{} (Web)", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// The normalised API base URL.
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    /// Check if the client has an access token.
    pub fn is_authenticated(&self) -> bool {
        self.config.access_token.is_some()
    }

    /// Probe `GET /health`.
    ///
    /// Any HTTP response counts as reachable; non-2xx statuses are returned
    /// as [`ServerClientError::ServerError`].
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = join(&self.base_url, &["health"])?;
        debug!(url = %url, "Checking backend health");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!(status = status.as_u16(), "Backend healthy");
            Ok(HealthStatus {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(ServerClientError::ServerError {
                status: status.as_u16(),
                message: body,
            })
        }
    }

    /// Get a library client for listing operations.
    pub fn library(&self) -> LibraryClient<'_> {
        LibraryClient::new(
            &self.http,
            &self.base_url,
            self.config.access_token.as_deref(),
        )
    }

    /// Shorthand for `library().list_tracks(query)`.
    pub async fn list_tracks(&self, query: &TrackQuery) -> Result<Vec<Track>> {
        self.library().list_tracks(query).await
    }

    /// A stream URL resolver sharing this client's connection pool.
    pub fn resolver(&self) -> StreamUrlResolver {
        StreamUrlResolver::new(
            self.http.clone(),
            self.base_url.clone(),
            self.config.access_token.clone(),
            self.config.trust.clone(),
        )
    }
}
