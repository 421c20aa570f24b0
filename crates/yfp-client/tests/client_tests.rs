//! Streaming client tests
//!
//! Tests for:
//! - Connection state transitions and the Disconnected guarantee
//! - Frames on the bulk stream, byte for byte
//! - Control-channel dispatch (DETECTIONS, METRICS, PING, garbage)
//! - Discovery success and failure
//! - Connect failures

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use yfp_client::prelude::*;
use yfp_core::framing::{JPEG_EOI, JPEG_SOI};
use yfp_core::Message;
use yfp_test_utils::{find_available_udp_port, wait_for, TestServer, DEFAULT_TIMEOUT};

const QUIET: Duration = Duration::from_millis(300);

fn client_for(server: &TestServer) -> (StreamClient, EventReceiver) {
    StreamClient::builder()
        .device_name("Pixel")
        .device_id("test-device")
        .server_port(server.port())
        .discovery_port(server.discovery_port())
        .broadcast_addr(server.ip())
        .discovery_timeout(2000)
        .connect_timeout(2000)
        .build()
        .unwrap()
}

/// Next event, failing the test if none arrives in time
fn next_event(events: &EventReceiver) -> ClientEvent {
    events
        .recv_timeout(DEFAULT_TIMEOUT)
        .expect("timed out waiting for an event")
}

fn connected_pair(server: &TestServer) -> (StreamClient, EventReceiver) {
    let (client, events) = client_for(server);
    client.connect(server.ip());
    assert_eq!(next_event(&events), ClientEvent::Connected);
    assert!(server.wait_for_client(DEFAULT_TIMEOUT));
    (client, events)
}

fn jpeg(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i % 200) as u8).collect();
    data[..2].copy_from_slice(&JPEG_SOI);
    data[len - 2..].copy_from_slice(&JPEG_EOI);
    data
}

fn detections(frame_id: i64) -> DetectionSet {
    DetectionSet {
        frame_id,
        detections: vec![Detection {
            x: 0.1,
            y: 0.2,
            width: 0.3,
            height: 0.4,
            class_name: "person".into(),
            confidence: 0.92,
        }],
        processing_time_ms: 18,
    }
}

// ============================================================================
// Connection State
// ============================================================================

#[test]
fn test_new_client_is_idle() {
    let server = TestServer::start();
    let (client, events) = client_for(&server);

    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(!client.is_connected());
    assert!(client.server().is_none());
    assert!(events.recv_timeout(Duration::from_millis(50)).is_none());
}

#[test]
fn test_connect_announces_and_reaches_connected() {
    let server = TestServer::start();
    let (client, _events) = connected_pair(&server);

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.server(), Some(server.ip()));

    let connects = server.connects();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].device_id, "test-device");
    assert_eq!(connects[0].resolution_width, 1920);
    assert_eq!(connects[0].resolution_height, 1080);

    assert!(wait_for(|| server.stream_count() == 1, DEFAULT_TIMEOUT));
}

#[test]
fn test_disconnect_posts_exactly_one_event() {
    let server = TestServer::start();
    let (client, events) = connected_pair(&server);

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.server().is_none());
    assert_eq!(next_event(&events), ClientEvent::Disconnected);

    // The listener is gone: nothing it would have dispatched shows up
    server.send_message(Message::Detections(detections(1)));
    assert!(events.recv_timeout(QUIET).is_none());
}

#[test]
fn test_disconnect_when_idle_still_notifies() {
    let server = TestServer::start();
    let (client, events) = client_for(&server);

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(next_event(&events), ClientEvent::Disconnected);
}

#[test]
fn test_connect_while_connected_replaces_session() {
    let server = TestServer::start();
    let (client, events) = connected_pair(&server);

    client.connect(server.ip());
    assert_eq!(next_event(&events), ClientEvent::Disconnected);
    assert_eq!(next_event(&events), ClientEvent::Connected);
    assert!(client.is_connected());
    assert!(wait_for(|| server.stream_count() == 2, DEFAULT_TIMEOUT));
}

#[test]
fn test_connect_failure_never_reaches_connected() {
    // Nothing listens for TCP on a freshly released UDP port
    let port = find_available_udp_port();
    let (client, events) = StreamClient::builder()
        .server_port(port)
        .connect_timeout(1000)
        .build()
        .unwrap();

    client.connect(IpAddr::V4(Ipv4Addr::LOCALHOST));

    match next_event(&events) {
        ClientEvent::Error(ClientError::ConnectionFailed(_)) => {}
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(events.recv_timeout(QUIET).is_none());
}

#[test]
fn test_disconnect_cancels_pending_connect() {
    let server = TestServer::start();
    let (client, events) = client_for(&server);

    client.connect(server.ip());
    client.disconnect();

    let mut seen = Vec::new();
    while let Some(event) = events.recv_timeout(QUIET) {
        seen.push(event);
    }

    // However the attempt raced the disconnect, nothing is live afterwards
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.server().is_none());
    let last_disconnect = seen
        .iter()
        .rposition(|e| *e == ClientEvent::Disconnected)
        .expect("disconnect must be reported");
    assert!(!seen[last_disconnect..].contains(&ClientEvent::Connected));
    assert_eq!(
        seen.iter().filter(|e| **e == ClientEvent::Disconnected).count(),
        1
    );

    // A later connect is unaffected by the cancelled one
    client.connect(server.ip());
    assert_eq!(next_event(&events), ClientEvent::Connected);
    assert!(client.is_connected());
}

#[test]
fn test_shutdown_disconnects() {
    let server = TestServer::start();
    let (client, events) = connected_pair(&server);

    client.shutdown();
    assert_eq!(next_event(&events), ClientEvent::Disconnected);
    assert!(events.recv_timeout(QUIET).is_none());
}

// ============================================================================
// Frame Transmission
// ============================================================================

#[test]
fn test_send_frame_arrives_intact() {
    let server = TestServer::start();
    let (client, events) = connected_pair(&server);

    let payload = jpeg(12345);
    client.send_frame(payload.clone(), 7, 1920, 1080);

    assert!(server.wait_for_frames(1, DEFAULT_TIMEOUT));
    let frame = &server.frames()[0];
    assert_eq!(frame.header.frame_id, 7);
    assert_eq!(frame.header.width, 1920);
    assert_eq!(frame.header.height, 1080);
    assert_eq!(frame.header.format, "JPEG");
    assert_eq!(frame.header.quality, 80);
    assert_eq!(frame.payload.as_ref(), payload.as_slice());

    assert!(wait_for(|| client.frames_sent() == 1, DEFAULT_TIMEOUT));
    assert!(events.recv_timeout(QUIET).is_none());
}

#[test]
fn test_frames_arrive_in_order() {
    let server = TestServer::start();
    let (client, _events) = connected_pair(&server);

    for id in 1..=5 {
        client.send_frame(jpeg(2048), id, 640, 480);
        // Each send is its own task; space them so order is deterministic
        assert!(wait_for(|| client.frames_sent() == id as u64, DEFAULT_TIMEOUT));
    }

    assert!(server.wait_for_frames(5, DEFAULT_TIMEOUT));
    let ids: Vec<i64> = server.frames().iter().map(|f| f.header.frame_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_send_failure_keeps_connection_state() {
    let mut server = TestServer::start();
    let (client, events) = connected_pair(&server);
    assert!(wait_for(|| server.stream_count() == 1, DEFAULT_TIMEOUT));

    // Closes the accepted stream; the next writes hit a dead peer
    server.stop();

    let deadline = Instant::now() + DEFAULT_TIMEOUT;
    let mut frame_id = 0;
    let mut failure = None;
    while failure.is_none() && Instant::now() < deadline {
        frame_id += 1;
        client.send_frame(jpeg(8192), frame_id, 640, 480);
        if let Some(ClientEvent::Error(e)) = events.recv_timeout(Duration::from_millis(20)) {
            failure = Some(e);
        }
    }

    match failure {
        Some(ClientError::SendFailed(_)) => {}
        other => panic!("expected SendFailed, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.is_connected());
}

#[test]
fn test_send_frame_without_connection_is_dropped() {
    let server = TestServer::start();
    let (client, events) = client_for(&server);

    client.send_frame(jpeg(64), 1, 4, 4);

    assert_eq!(client.frames_sent(), 0);
    assert!(events.recv_timeout(QUIET).is_none());
    assert_eq!(server.stream_count(), 0);
}

#[test]
fn test_send_frame_after_disconnect_is_dropped() {
    let server = TestServer::start();
    let (client, events) = connected_pair(&server);

    client.disconnect();
    assert_eq!(next_event(&events), ClientEvent::Disconnected);

    client.send_frame(jpeg(64), 1, 4, 4);
    assert!(events.recv_timeout(QUIET).is_none());
    assert_eq!(client.frames_sent(), 0);
    assert!(server.frames().is_empty());
}

// ============================================================================
// Control Channel
// ============================================================================

#[test]
fn test_detections_dispatched_after_corrupt_datagram() {
    let server = TestServer::start();
    let (_client, events) = connected_pair(&server);

    server.send_raw(b"\x00\x01 definitely not json");
    server.send_message(Message::Detections(detections(42)));

    match next_event(&events) {
        ClientEvent::Detections(set) => {
            assert_eq!(set.frame_id, 42);
            assert_eq!(set.detections.len(), 1);
            assert_eq!(set.detections[0].class_name, "person");
            assert_eq!(set.detections[0].confidence, 0.92);
        }
        other => panic!("expected detections, got {:?}", other),
    }
    assert!(events.recv_timeout(QUIET).is_none());
}

#[test]
fn test_out_of_bounds_detections_still_delivered() {
    let server = TestServer::start();
    let (_client, events) = connected_pair(&server);

    let mut set = detections(3);
    set.detections[0].x = 0.9;
    set.detections[0].width = 0.5;
    server.send_message(Message::Detections(set.clone()));

    assert_eq!(next_event(&events), ClientEvent::Detections(set));
}

#[test]
fn test_metrics_dispatched() {
    let server = TestServer::start();
    let (_client, events) = connected_pair(&server);

    let sample = MetricsSample {
        fps: 29.5,
        network_latency_ms: 12,
        detection_time_ms: 20,
        total_frames_sent: 300,
    };
    server.send_message(Message::Metrics(sample.clone()));

    assert_eq!(next_event(&events), ClientEvent::Metrics(sample));
}

#[test]
fn test_ping_answered_without_event() {
    let server = TestServer::start();
    let (_client, events) = connected_pair(&server);

    server.send_message(Message::Ping);

    assert!(server.wait_for_pongs(1, DEFAULT_TIMEOUT));
    assert!(events.recv_timeout(QUIET).is_none());
    assert_eq!(server.pong_count(), 1);
}

#[test]
fn test_dispatch_pending_calls_handler() {
    #[derive(Default)]
    struct Collector {
        connected: bool,
        frames: Vec<i64>,
    }

    impl ClientHandler for Collector {
        fn on_connected(&mut self) {
            self.connected = true;
        }
        fn on_detections(&mut self, detections: DetectionSet) {
            self.frames.push(detections.frame_id);
        }
    }

    let server = TestServer::start();
    let (client, events) = client_for(&server);
    client.connect(server.ip());
    assert!(server.wait_for_client(DEFAULT_TIMEOUT));
    assert!(wait_for(|| client.is_connected(), DEFAULT_TIMEOUT));

    server.send_message(Message::Detections(detections(10)));
    server.send_message(Message::Detections(detections(11)));

    let mut collector = Collector::default();
    let deadline = Instant::now() + DEFAULT_TIMEOUT;
    while collector.frames.len() < 2 && Instant::now() < deadline {
        events.dispatch_pending(&mut collector);
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(collector.connected);
    assert_eq!(collector.frames, vec![10, 11]);
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_discover_reports_server() {
    let server = TestServer::start();
    let (client, events) = client_for(&server);

    client.discover();
    assert_eq!(next_event(&events), ClientEvent::ServerDiscovered(server.ip()));
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[test]
fn test_discover_timeout_reports_failure() {
    let (client, events) = StreamClient::builder()
        .broadcast_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .discovery_port(find_available_udp_port())
        .discovery_timeout(200)
        .build()
        .unwrap();

    client.discover();

    match next_event(&events) {
        ClientEvent::Error(ClientError::DiscoveryFailed(_)) => {}
        other => panic!("expected DiscoveryFailed, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[test]
fn test_discover_keeps_live_session() {
    let server = TestServer::start();
    let (client, events) = connected_pair(&server);

    client.discover();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(next_event(&events), ClientEvent::ServerDiscovered(server.ip()));
    assert!(client.is_connected());
}
