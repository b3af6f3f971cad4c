//! Soul Player Core
//!
//! Platform-agnostic domain types and seams shared by the streaming client crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `StreamEndpoint`, `TrustTier`
//! - **Core Traits**: `StreamResolver` (track id -> playable, validated URL)
//! - **Error Handling**: `SoulError` for domain validation, `ResolutionError` for URL resolution
//!
//! # Example
//!
//! ```rust
//! use soul_core::types::{Track, TrackId, TrackKind};
//! use std::time::Duration;
//!
//! let track = Track::new(TrackId::new("665f1c"), "Night Drive", "Low Tide")
//!     .with_duration(Duration::from_secs(214));
//!
//! assert_eq!(track.kind, TrackKind::Song);
//! assert!(track.id.is_usable());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ResolutionError, Result, SoulError};
pub use traits::StreamResolver;
pub use types::{CoverArt, StreamEndpoint, StreamKind, Track, TrackId, TrackKind, TrustTier};
