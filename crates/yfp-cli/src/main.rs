//! YFP CLI - stream camera frames to a YFP detection server
//!
//! Discovers a server on the local network, connects, and streams encoded
//! image files as frames while printing the detections that come back.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use yfp_client::StreamClient;

mod config;
mod stream;

use config::FileConfig;
use stream::StreamOptions;

/// YFP - capture device to detection server streaming
#[derive(Parser)]
#[command(name = "yfp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "YFP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a server on the local network
    Discover {
        /// How long to wait for a reply
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Stream image files to a server
    Stream {
        /// Server address (discovered when omitted)
        #[arg(short, long)]
        server: Option<IpAddr>,

        /// Capture ticks per second
        #[arg(short, long)]
        fps: Option<u32>,

        /// Send every N-th tick
        #[arg(long)]
        stride: Option<u32>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration_secs: Option<u64>,

        /// Encoded frames to send, cycled in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    let mut file_config = FileConfig::load(cli.config.as_deref())?;

    // Handle Ctrl+C
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    if let Commands::Discover {
        timeout_ms: Some(ms),
    } = &cli.command
    {
        file_config.client.discovery_timeout_ms = *ms;
    }

    let (client, events) = StreamClient::new(file_config.client)
        .context("Failed to start client")?;

    let result = match cli.command {
        Commands::Discover { .. } => {
            stream::discover(&client, &events, &running).map(|ip| println!("{}", ip))
        }
        Commands::Stream {
            server,
            fps,
            stride,
            duration_secs,
            files,
        } => {
            let mut settings = file_config.stream;
            settings.fps = fps.unwrap_or(settings.fps);
            settings.stride = stride.unwrap_or(settings.stride);

            stream::stream(
                &client,
                &events,
                &running,
                StreamOptions {
                    server,
                    settings,
                    duration: duration_secs.map(Duration::from_secs),
                    files,
                },
            )
        }
    };

    if !running.load(Ordering::SeqCst) {
        info!("Received shutdown signal");
    }
    client.shutdown();

    result
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}
