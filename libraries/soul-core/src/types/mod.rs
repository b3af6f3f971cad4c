//! Domain types for Soul Player

mod ids;
mod stream;
mod track;

pub use ids::TrackId;
pub use stream::{StreamEndpoint, StreamKind, TrustTier};
pub use track::{CoverArt, Track, TrackKind};
