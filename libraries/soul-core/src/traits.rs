/// Core traits for Soul Player
use crate::error::ResolutionError;
use crate::types::{StreamEndpoint, TrackId};
use async_trait::async_trait;

/// Turns a track identifier into a playable, origin-validated stream URL.
///
/// Implementations must fail closed: a URL that matches no trust tier is
/// reported as [`ResolutionError::UntrustedOrigin`], never returned.
/// Implementations do not retry; that is the caller's decision.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve the stream endpoint for `track_id`
    ///
    /// # Errors
    /// Returns one of the [`ResolutionError`] kinds describing why no
    /// endpoint could be produced.
    async fn resolve(&self, track_id: &TrackId) -> Result<StreamEndpoint, ResolutionError>;
}
