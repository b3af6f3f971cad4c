/// Playback check configuration
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use soul_playback::PlayerConfig;
use soul_server_client::ServerConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "playback-check.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub probe: ProbeSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeSettings {
    /// Tracks to probe when `--limit` is not given
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Segments that must reach the sink before a track counts as playing
    #[serde(default = "default_min_segments")]
    pub min_segments: usize,

    /// Per-track budget in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            min_segments: default_min_segments(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_limit() -> u32 {
    5
}

fn default_min_segments() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    30
}

impl CheckConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `playback-check.toml` in the
    /// working directory is used if present. Environment variables prefixed
    /// with `SOUL_` override the file, with `__` between nested keys
    /// (`SOUL_SERVER__ACCESS_TOKEN`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SOUL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::build(settings)
    }

    fn build(settings: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        settings
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = url {
            self.server.url = url;
        }
        if token.is_some() {
            self.server.access_token = token;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            bail!("API URL is required (set SOUL_SERVER__URL or pass --url)");
        }
        if self.probe.limit == 0 {
            bail!("probe.limit must be at least 1");
        }
        if self.probe.timeout_secs == 0 {
            bail!("probe.timeout_secs must be at least 1");
        }
        Ok(())
    }
}
