//! mapnav - headless map navigation session
//!
//! Runs one navigation session and bridges it to an external map view over
//! JSON lines: map events, UI intents and device readings on stdin, view
//! commands on stdout. Logs go to stderr.
//!
//! Module structure:
//! - `domain/` - Core types (GeoPoint, SessionState, errors)
//! - `io/` - External interfaces (Directions Service, device sensors, view, bridge)
//! - `services/` - Session state machine, trackers, route planner, view adapter
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use mapnav::infra::{Config, Metrics};
use mapnav::io::{
    create_view_channel, orientation_channel, run_output, Bridge, FixFeed, StaticPermission,
};
use mapnav::services::{HttpRoutePlanner, NavigationSession};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// View command buffer; commands beyond this are dropped and counted
const VIEW_CHANNEL_SIZE: usize = 1024;

/// Headless map navigation session over JSON lines
#[derive(Parser, Debug)]
#[command(name = "mapnav", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Run as a platform without orientation sensors
    #[arg(long)]
    no_orientation: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the view protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("GIT_HASH"), "mapnav starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);
    let orientation_enabled = !args.no_orientation;

    info!(
        config_file = %config.config_file(),
        directions_api_base = %config.directions_api_base(),
        language = ?config.language(),
        map_style_url = %config.map_style_url(),
        geolocation_timeout_ms = %config.geolocation_timeout_ms(),
        poll_interval_ms = %config.poll_interval().as_millis(),
        orientation = %orientation_enabled,
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    let planner = Arc::new(HttpRoutePlanner::new(&config)?);
    let fixes = Arc::new(FixFeed::new());
    let (view, view_rx) = create_view_channel(VIEW_CHANNEL_SIZE, metrics.clone());

    // Start view writer first so mount-time commands are not lost
    let output = tokio::spawn(async move {
        if let Err(e) = run_output(view_rx, tokio::io::stdout()).await {
            error!(error = %e, "view_output_failed");
        }
    });

    let metrics_interval = config.metrics_interval_secs();
    let mut session = NavigationSession::new(
        config,
        planner,
        fixes.clone(),
        Arc::new(StaticPermission::granted()),
        view,
        metrics.clone(),
    );

    let orientation_feed = if orientation_enabled {
        let (feed, source) = orientation_channel();
        session.attach_orientation(Some(source));
        Some(feed)
    } else {
        session.attach_orientation(None);
        None
    };

    // Start stdin bridge; EOF ends the session
    let bridge = Bridge::new(session.handle(), fixes, orientation_feed);
    let bridge_shutdown = shutdown_rx.clone();
    let eof_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = bridge.run_input(stdin, bridge_shutdown).await {
            error!(error = %e, "bridge_input_failed");
        }
        let _ = eof_signal.send(true);
    });

    // Start metrics reporter (lock-free reads)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run session - consumes events until shutdown
    info!(session = %session.id(), "session_starting");
    session.run(shutdown_rx).await;

    // Session dropped its view sender; let the writer flush what is queued
    let _ = output.await;

    metrics.report().log();
    info!("mapnav shutdown complete");
    Ok(())
}
