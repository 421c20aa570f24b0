//! Discover and stream commands

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use colored::Colorize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use yfp_client::prelude::*;

use crate::config::StreamSettings;

/// How often the event queue is polled while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Options for `yfp stream`
pub struct StreamOptions {
    pub server: Option<IpAddr>,
    pub settings: StreamSettings,
    pub duration: Option<Duration>,
    pub files: Vec<PathBuf>,
}

/// Wait for the first event `pick` accepts. Events it declines are printed.
fn wait_for_event<T>(
    events: &EventReceiver,
    max_wait: Duration,
    running: &AtomicBool,
    mut pick: impl FnMut(&ClientEvent) -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + max_wait;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        if let Some(event) = events.recv_timeout(POLL_INTERVAL) {
            if let Some(found) = pick(&event) {
                return Some(found);
            }
            event.dispatch(&mut Printer);
        }
    }
    None
}

/// Find a server, reporting failure as an error
pub fn discover(
    client: &StreamClient,
    events: &EventReceiver,
    running: &AtomicBool,
) -> Result<IpAddr> {
    println!("{} Searching for a server...", "YFP".cyan().bold());
    client.discover();

    // Discovery always ends in exactly one of these two events
    let max_wait = Duration::from_millis(client.config().discovery_timeout_ms) + Duration::from_secs(1);
    let outcome = wait_for_event(events, max_wait, running, |event| match event {
        ClientEvent::ServerDiscovered(ip) => Some(Ok(*ip)),
        ClientEvent::Error(e @ ClientError::DiscoveryFailed(_)) => Some(Err(e.clone())),
        _ => None,
    });

    match outcome {
        Some(Ok(ip)) => {
            println!("  Found server at {}", ip.to_string().green());
            Ok(ip)
        }
        Some(Err(e)) => bail!(e),
        None => bail!("discovery interrupted"),
    }
}

/// Connect, then send frames read from disk at a fixed cadence
pub fn stream(
    client: &StreamClient,
    events: &EventReceiver,
    running: &AtomicBool,
    options: StreamOptions,
) -> Result<()> {
    let frames = load_frames(&options.files)?;
    let server = match options.server {
        Some(ip) => ip,
        None => discover(client, events, running)?,
    };

    client.connect(server);
    let max_wait = Duration::from_millis(client.config().connect_timeout_ms) + Duration::from_secs(1);
    let connected = wait_for_event(events, max_wait, running, |event| match event {
        ClientEvent::Connected => Some(Ok(())),
        ClientEvent::Error(e @ ClientError::ConnectionFailed(_)) => Some(Err(e.clone())),
        _ => None,
    });
    match connected {
        Some(Ok(())) => println!("{} Connected to {}", "YFP".cyan().bold(), server.to_string().green()),
        Some(Err(e)) => bail!(e),
        None => bail!("connection to {} interrupted", server),
    }

    let settings = &options.settings;
    let tick = Duration::from_secs_f64(1.0 / f64::from(settings.fps.max(1)));
    let stride = u64::from(settings.stride.max(1));
    let (width, height) = (
        client.config().resolution_width,
        client.config().resolution_height,
    );
    info!(
        "Streaming {} file(s) at {} fps, sending every {} tick(s)",
        frames.len(),
        settings.fps,
        stride
    );

    let started = Instant::now();
    let mut printer = Printer;
    let mut ticks: u64 = 0;

    while running.load(Ordering::SeqCst) {
        if options.duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }

        if ticks % stride == 0 {
            let frame = &frames[(ticks / stride) as usize % frames.len()];
            client.send_frame(frame.clone(), ticks as i64, width, height);
        }
        ticks += 1;

        events.dispatch_pending(&mut printer);
        if !client.is_connected() {
            println!("{} Connection lost", "YFP".yellow().bold());
            break;
        }

        std::thread::sleep(tick);
    }

    events.dispatch_pending(&mut printer);
    println!(
        "{} Sent {} frame(s) in {:.1}s",
        "YFP".cyan().bold(),
        client.frames_sent(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn load_frames(files: &[PathBuf]) -> Result<Vec<Bytes>> {
    if files.is_empty() {
        bail!("no frame files given");
    }

    files
        .iter()
        .map(|path| {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read frame {}", path.display()))?;
            debug!("Loaded {} ({} bytes)", path.display(), data.len());
            Ok(Bytes::from(data))
        })
        .collect()
}

/// Prints events to stdout
struct Printer;

impl ClientHandler for Printer {
    fn on_server_discovered(&mut self, server: IpAddr) {
        println!("  Server at {}", server.to_string().green());
    }

    fn on_connected(&mut self) {
        println!("{} Connected", "YFP".cyan().bold());
    }

    fn on_disconnected(&mut self) {
        println!("{} Disconnected", "YFP".cyan().bold());
    }

    fn on_detections(&mut self, set: DetectionSet) {
        println!(
            "{} frame {} ({} ms)",
            "DET".green().bold(),
            set.frame_id,
            set.processing_time_ms
        );
        for d in &set.detections {
            println!(
                "    {} {:.2} at ({:.2}, {:.2}) {:.2}x{:.2}",
                d.class_name.bold(),
                d.confidence,
                d.x,
                d.y,
                d.width,
                d.height
            );
        }
    }

    fn on_metrics(&mut self, m: MetricsSample) {
        println!(
            "{} {:.1} fps, latency {} ms, detection {} ms, {} frames",
            "MET".blue().bold(),
            m.fps,
            m.network_latency_ms,
            m.detection_time_ms,
            m.total_frames_sent
        );
    }

    fn on_error(&mut self, error: ClientError) {
        eprintln!("{} {}", "ERR".red().bold(), error);
    }
}
