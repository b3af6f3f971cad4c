//! Track listing.

use crate::error::{Result, ServerClientError};
use crate::types::{TrackListEnvelope, TrackQuery};
use reqwest::Client;
use soul_core::Track;
use tracing::{debug, warn};
use url::Url;

/// Library client for the streaming API.
pub struct LibraryClient<'a> {
    http: &'a Client,
    base_url: &'a Url,
    access_token: Option<&'a str>,
}

impl<'a> LibraryClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a Url, access_token: Option<&'a str>) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// List tracks, normalised into [`Track`]s.
    ///
    /// Records without a usable identifier are skipped.
    pub async fn list_tracks(&self, query: &TrackQuery) -> Result<Vec<Track>> {
        let url = join(self.base_url, &["tracks"])?;
        debug!(url = %url, query = ?query, "Fetching tracks");

        let mut request = self.http.get(url).query(query);
        if let Some(token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ServerClientError::from_send)?;
        let status = response.status();

        if status.is_success() {
            let envelope: TrackListEnvelope = response.json().await.map_err(|e| {
                ServerClientError::ParseError(format!("Failed to parse track list: {}", e))
            })?;

            let records = envelope.into_records();
            let total = records.len();
            let tracks: Vec<Track> = records
                .into_iter()
                .filter_map(|record| {
                    let title = record.title.clone();
                    let track = record.normalize();
                    if track.is_none() {
                        warn!(title = %title, "Skipping track record without a usable id");
                    }
                    track
                })
                .collect();

            debug!(received = total, kept = tracks.len(), "Fetched tracks");
            Ok(tracks)
        } else if status.as_u16() == 401 {
            Err(ServerClientError::AuthRequired)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ServerClientError::ServerError {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}

/// Append path segments to the API base, keeping its version prefix.
pub(crate) fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ServerClientError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_keeps_version_prefix() {
        let base = Url::parse("https://api.example.com/api/v1").unwrap();
        assert_eq!(
            join(&base, &["tracks"]).unwrap().as_str(),
            "https://api.example.com/api/v1/tracks"
        );

        let base = Url::parse("https://api.example.com").unwrap();
        assert_eq!(
            join(&base, &["health"]).unwrap().as_str(),
            "https://api.example.com/health"
        );
    }
}
