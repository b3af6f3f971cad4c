//! Soul Player Server Client
//!
//! HTTP client library for the Soul Player streaming API.
//!
//! # Features
//!
//! - **Stream resolution**: track id -> signed stream URL, validated against a
//!   configurable [`TrustPolicy`] before it is handed to playback
//! - **Library**: list tracks, normalised into [`soul_core::Track`]
//! - **Health**: backend reachability probe
//!
//! # Example
//!
//! ```ignore
//! use soul_server_client::{ServerConfig, SoulServerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SoulServerClient::new(ServerConfig::new("http://localhost:5000/api/v1"))?;
//!
//!     client.health().await?;
//!
//!     let endpoint = client.resolver().resolve_id("665f1c").await?;
//!     println!("Streaming from {} ({})", endpoint.redacted_url(), endpoint.tier);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod library;
mod stream;
mod trust;
mod types;

// Re-export main types
pub use client::SoulServerClient;
pub use error::{Result, ServerClientError};
pub use library::LibraryClient;
pub use stream::StreamUrlResolver;
pub use trust::{TrustPolicy, TrustRule};
pub use types::{HealthStatus, ServerConfig, ServerTrack, StreamUrlBody, TrackQuery, DEFAULT_API_URL};
