//! Mock Directions Service
//!
//! Simulates the Directions Service for local runs of the `mapnav` binary.
//!
//! Behavior:
//! 1. Listens on a configurable port (default 8085)
//! 2. `GET /{profile}/{lng,lat;lng,lat[;...]}` returns a straight-line route
//!    through the requested points with one instruction per leg
//! 3. Unknown profile -> 404; fewer than two coordinates -> zero routes
//!
//! Usage:
//!   cargo run --bin mock_directions -- --port 8085 --delay-ms 300
//!   and set `[directions] api_base = "http://127.0.0.1:8085"` in the config

use clap::Parser;
use mapnav::io::mock_directions::{serve, MockDirections, MockReply};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock_directions")]
#[command(about = "Mock Directions Service for local simulation")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "8085")]
    port: u16,

    /// Artificial latency added to every response (ms)
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Answer every request with this HTTP status instead of a route
    #[arg(long)]
    fail_status: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();

    let reply = match args.fail_status {
        Some(code) => MockReply::Status(code),
        None => MockReply::StraightLine,
    };
    let mock = MockDirections::new(reply);
    mock.set_delay(Duration::from_millis(args.delay_ms));

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = %args.port, delay_ms = %args.delay_ms, "mock_directions listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    serve(listener, mock, shutdown_rx).await;
    Ok(())
}
