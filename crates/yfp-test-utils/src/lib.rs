//! Common test helpers for YFP tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - [`TestServer`], an in-process detection server with RAII cleanup
//!
//! The client under test drives its own worker pool from plain `#[test]`
//! functions, so everything here is synchronous and the server runs on a
//! runtime of its own.

use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tracing::{debug, warn};
use yfp_core::{codec, ConnectData, Envelope, Message};
use yfp_discovery::BroadcastResponder;
use yfp_transport::{FrameReader, ReceivedFrame, UdpTransport};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Name the test server advertises during discovery
pub const TEST_SERVER_NAME: &str = "YFP Test Server";

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available UDP port for testing
pub fn find_available_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Poll `check` until it holds or `max_wait` elapses
pub fn wait_for<F>(check: F, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        std::thread::sleep(DEFAULT_CHECK_INTERVAL);
    }
    check()
}

/// Wait for an atomic counter to reach a target value
pub fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(|| counter.load(Ordering::SeqCst) >= target, max_wait)
}

// ============================================================================
// Test Server - RAII wrapper with proper cleanup
// ============================================================================

#[derive(Default)]
struct Recorded {
    client: Mutex<Option<SocketAddr>>,
    connects: Mutex<Vec<ConnectData>>,
    frames: Mutex<Vec<ReceivedFrame>>,
    pongs: AtomicU32,
    streams: AtomicU32,
}

/// A detection server on 127.0.0.1 that records what clients send it.
///
/// The UDP control socket and the TCP stream listener share one port
/// number, as a real server's do. A discovery responder listens on a
/// separate port. Everything stops when the server is dropped.
pub struct TestServer {
    runtime: Option<Runtime>,
    port: u16,
    discovery_port: u16,
    control: UdpTransport,
    recorded: Arc<Recorded>,
}

impl TestServer {
    /// Start a test server on free ports
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("yfp-test-server")
            .enable_all()
            .build()
            .expect("test server runtime");

        let (listener, control) = runtime.block_on(bind_pair());
        let port = control.local_addr().unwrap().port();

        let responder = runtime
            .block_on(BroadcastResponder::bind(
                "127.0.0.1:0",
                TEST_SERVER_NAME.to_string(),
                yfp_core::APP_VERSION.to_string(),
            ))
            .expect("discovery responder");
        let discovery_port = responder.local_addr().unwrap().port();

        let recorded = Arc::new(Recorded::default());

        runtime.spawn(async move {
            if let Err(e) = responder.run().await {
                warn!("Test responder stopped: {}", e);
            }
        });
        runtime.spawn(control_loop(control.clone(), recorded.clone()));
        runtime.spawn(stream_loop(listener, recorded.clone()));

        Self {
            runtime: Some(runtime),
            port,
            discovery_port,
            control,
            recorded,
        }
    }

    /// Address clients should connect to
    pub fn ip(&self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    /// Control and stream port
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn discovery_port(&self) -> u16 {
        self.discovery_port
    }

    /// Source address of the most recent control datagram
    pub fn client_addr(&self) -> Option<SocketAddr> {
        *self.recorded.client.lock()
    }

    /// CONNECT payloads received so far
    pub fn connects(&self) -> Vec<ConnectData> {
        self.recorded.connects.lock().clone()
    }

    /// Frames read off all accepted streams
    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.recorded.frames.lock().clone()
    }

    pub fn pong_count(&self) -> u32 {
        self.recorded.pongs.load(Ordering::SeqCst)
    }

    /// Number of stream connections accepted
    pub fn stream_count(&self) -> u32 {
        self.recorded.streams.load(Ordering::SeqCst)
    }

    /// Send raw bytes to the last client seen on the control channel
    pub fn send_raw(&self, data: &[u8]) {
        let target = self.client_addr().expect("no client has contacted the server");
        let runtime = self.runtime.as_ref().expect("server stopped");
        runtime
            .block_on(self.control.send_to(data, target))
            .expect("send to client");
    }

    /// Encode and send a message to the last client seen
    pub fn send_message(&self, message: Message) {
        let bytes = codec::encode_message(message).expect("encode");
        self.send_raw(&bytes);
    }

    /// Wait until a client has sent CONNECT
    pub fn wait_for_client(&self, max_wait: Duration) -> bool {
        wait_for(|| !self.recorded.connects.lock().is_empty(), max_wait)
    }

    pub fn wait_for_frames(&self, n: usize, max_wait: Duration) -> bool {
        wait_for(|| self.recorded.frames.lock().len() >= n, max_wait)
    }

    pub fn wait_for_pongs(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.recorded.pongs, n, max_wait)
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bind a TCP listener and a UDP socket on the same loopback port
async fn bind_pair() -> (TcpListener, UdpTransport) {
    for _ in 0..20 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        if let Ok(control) = UdpTransport::bind(&format!("127.0.0.1:{}", port)).await {
            return (listener, control);
        }
    }
    panic!("could not bind TCP and UDP on a shared port");
}

async fn control_loop(control: UdpTransport, recorded: Arc<Recorded>) {
    let mut buf = vec![0u8; control.recv_buffer_size()];
    loop {
        let (len, from) = match control.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Test control socket failed: {}", e);
                return;
            }
        };
        *recorded.client.lock() = Some(from);

        match codec::decode(&buf[..len]) {
            Ok(Envelope {
                message: Message::Connect(data),
                ..
            }) => recorded.connects.lock().push(data),
            Ok(Envelope {
                message: Message::Pong,
                ..
            }) => {
                recorded.pongs.fetch_add(1, Ordering::SeqCst);
            }
            Ok(other) => debug!("Test server ignoring {}", other.message_type()),
            Err(e) => debug!("Test server got undecodable datagram: {}", e),
        }
    }
}

async fn stream_loop(listener: TcpListener, recorded: Arc<Recorded>) {
    while let Ok((stream, peer)) = listener.accept().await {
        recorded.streams.fetch_add(1, Ordering::SeqCst);
        let recorded = recorded.clone();
        tokio::spawn(async move {
            let mut reader = FrameReader::new(stream);
            loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => recorded.frames.lock().push(frame),
                    Ok(None) => break,
                    Err(e) => {
                        debug!("Test stream from {} ended: {}", peer, e);
                        break;
                    }
                }
            }
        });
    }
}
