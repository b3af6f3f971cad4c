/// Playback Check - exercises the Soul Player streaming pipeline against a live backend
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use soul_core::{StreamResolver, Track, TrackId};
use soul_playback::{PlayOutcome, PlaybackMode, PlayerContext, TransportState};
use soul_server_client::{SoulServerClient, TrackQuery};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod sink;

use config::{CheckConfig, ProbeSettings};
use sink::{CountingSink, SinkStats};

#[derive(Parser)]
#[command(name = "playback-check")]
#[command(about = "Check Soul Player streaming against a backend", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API base URL, including the version prefix
    #[arg(long, global = true, env = "SOUL_API_URL")]
    url: Option<String>,

    /// Bearer token for the API
    #[arg(long, global = true, env = "SOUL_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the backend health endpoint
    Health,
    /// List tracks from the library
    List {
        /// Search text
        #[arg(short, long)]
        search: Option<String>,
        /// Maximum number of tracks
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Resolve and validate the stream URL of one track
    Resolve {
        /// Track id
        id: String,
    },
    /// Play the first tracks of the library into a headless sink
    Probe {
        /// Number of tracks (defaults to probe.limit)
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "playback_check=info,soul_playback=info,soul_server_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = CheckConfig::load(cli.config.as_deref())?.with_overrides(cli.url, cli.token);
    config.validate()?;

    let client = SoulServerClient::new(config.server.clone())
        .with_context(|| format!("Invalid API URL {:?}", config.server.url))?;
    tracing::info!(url = %client.url(), authenticated = client.is_authenticated(), "Using backend");

    match cli.command {
        Commands::Health => health(&client).await,
        Commands::List { search, limit } => list(&client, search, limit).await,
        Commands::Resolve { id } => resolve(&client, &id).await,
        Commands::Probe { limit } => {
            let limit = limit.unwrap_or(config.probe.limit);
            probe(&config, &client, limit).await
        }
    }
}

async fn health(client: &SoulServerClient) -> Result<()> {
    let status = client.health().await.context("Health check failed")?;
    println!("{} {}", status.status, status.body.trim());
    Ok(())
}

async fn list(client: &SoulServerClient, search: Option<String>, limit: u32) -> Result<()> {
    let query = TrackQuery {
        search,
        limit: Some(limit),
        page: None,
    };
    let tracks = client.list_tracks(&query).await.context("Listing tracks failed")?;

    for track in &tracks {
        println!("{}", describe(track));
    }
    println!("{} track(s)", tracks.len());
    Ok(())
}

async fn resolve(client: &SoulServerClient, id: &str) -> Result<()> {
    let endpoint = client
        .resolver()
        .resolve(&TrackId::new(id))
        .await
        .with_context(|| format!("Could not resolve track {id}"))?;

    println!("tier: {}", endpoint.tier);
    println!("kind: {:?}", endpoint.kind);
    println!("url:  {}", endpoint.redacted_url());
    Ok(())
}

async fn probe(config: &CheckConfig, client: &SoulServerClient, limit: u32) -> Result<()> {
    let query = TrackQuery {
        limit: Some(limit),
        ..TrackQuery::default()
    };
    let tracks = client.list_tracks(&query).await.context("Listing tracks failed")?;
    if tracks.is_empty() {
        bail!("Backend returned no tracks to probe");
    }

    let sink = Arc::new(CountingSink::new());
    let player = Arc::new(PlayerContext::new(
        Arc::new(client.resolver()),
        sink.clone(),
        &config.player,
    ));
    let runner = {
        let player = Arc::clone(&player);
        tokio::spawn(async move { player.run().await })
    };

    let total = tracks.len().min(limit as usize);
    let mut failures = 0usize;

    for track in tracks.into_iter().take(total) {
        let label = describe(&track);
        match probe_track(&player, &sink, &config.probe, track).await {
            Ok(report) => println!("OK   {label}  {report}"),
            Err(reason) => {
                failures += 1;
                println!("FAIL {label}  {reason}");
            }
        }
    }

    player.shutdown();
    runner.await.context("Player event loop panicked")?;

    println!("{} of {total} track(s) played", total - failures);
    if failures > 0 {
        bail!("{failures} of {total} track(s) failed");
    }
    Ok(())
}

/// Play one track and wait for enough of it to reach the sink.
async fn probe_track(
    player: &PlayerContext,
    sink: &CountingSink,
    settings: &ProbeSettings,
    track: Track,
) -> std::result::Result<String, String> {
    let started = Instant::now();

    match player.play_track(track, true, None).await {
        PlayOutcome::Started => {}
        PlayOutcome::Failed(failure) => {
            return Err(format!("[{}] {}", failure.kind(), failure.message()));
        }
        PlayOutcome::Superseded => return Err("superseded".into()),
    }

    let mode = player
        .controller()
        .engine()
        .live_handle()
        .map(|handle| handle.mode());

    // Plain files and native HLS are fetched by the sink itself
    if mode != Some(PlaybackMode::Software) {
        return Ok(format!("{mode:?}, attached in {:?}", started.elapsed()));
    }

    let deadline = started + settings.timeout();
    loop {
        let state = player.snapshot();
        if state.transport == TransportState::Error {
            let reason = state
                .last_error
                .map_or_else(|| "playback error".to_string(), |e| e.message().to_string());
            return Err(reason);
        }

        let stats = sink.stats();
        if stats.finished || stats.segments >= settings.min_segments {
            return Ok(summary(&stats, started.elapsed()));
        }

        if Instant::now() >= deadline {
            return Err(format!(
                "only {} segment(s) after {:?}",
                stats.segments,
                settings.timeout()
            ));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn summary(stats: &SinkStats, elapsed: Duration) -> String {
    format!(
        "Software, {} segment(s), {} KiB in {:.1}s{}",
        stats.segments,
        stats.bytes / 1024,
        elapsed.as_secs_f64(),
        if stats.finished { ", complete" } else { "" }
    )
}

fn describe(track: &Track) -> String {
    let secs = track.duration.as_secs();
    format!(
        "{}  {} - {} ({}:{:02})",
        track.id,
        track.artist,
        track.title,
        secs / 60,
        secs % 60
    )
}
