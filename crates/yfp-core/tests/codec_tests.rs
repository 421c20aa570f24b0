//! Codec tests for YFP core
//!
//! Tests for the envelope codec including:
//! - Round-trips for every message type
//! - Wire compatibility with server-produced JSON
//! - Malformed input rejection

use yfp_core::{
    codec, ConnectData, Detection, DetectionSet, DiscoverData, Envelope, Error, FrameHeader,
    Message, MessageType, MetricsSample,
};

fn roundtrip(message: Message) {
    let env = Envelope::with_timestamp(message, 1_712_345_678_901);
    let encoded = codec::encode(&env).expect("encode failed");
    let decoded = codec::decode(&encoded).expect("decode failed");
    assert_eq!(decoded, env);
}

fn assert_malformed(input: &[u8]) {
    match codec::decode(input) {
        Err(Error::MalformedMessage(_)) => {}
        other => panic!(
            "Expected MalformedMessage for {:?}, got {:?}",
            String::from_utf8_lossy(input),
            other
        ),
    }
}

// ============================================================================
// Round-trip Tests
// ============================================================================

#[test]
fn test_roundtrip_discover() {
    roundtrip(Message::Discover(DiscoverData {
        device_name: "Pixel".to_string(),
        app_version: "1.0".to_string(),
    }));
}

#[test]
fn test_roundtrip_connect() {
    roundtrip(Message::Connect(ConnectData {
        device_id: "pixel-7".to_string(),
        resolution_width: 1920,
        resolution_height: 1080,
    }));
}

#[test]
fn test_roundtrip_frame() {
    roundtrip(Message::Frame(FrameHeader {
        frame_id: 9_000_000_001,
        width: 640,
        height: 480,
        format: "JPEG".to_string(),
        quality: 80,
    }));
}

#[test]
fn test_roundtrip_detections() {
    roundtrip(Message::Detections(DetectionSet {
        frame_id: 3,
        detections: vec![
            Detection {
                x: 0.1,
                y: 0.2,
                width: 0.3,
                height: 0.4,
                class_name: "person".to_string(),
                confidence: 0.92,
            },
            Detection {
                x: 0.5,
                y: 0.5,
                width: 0.25,
                height: 0.125,
                class_name: "dog".to_string(),
                confidence: 0.33,
            },
        ],
        processing_time_ms: 17,
    }));
}

#[test]
fn test_roundtrip_empty_detections() {
    roundtrip(Message::Detections(DetectionSet {
        frame_id: 4,
        detections: vec![],
        processing_time_ms: 0,
    }));
}

#[test]
fn test_roundtrip_metrics() {
    roundtrip(Message::Metrics(MetricsSample {
        fps: 29.97,
        network_latency_ms: 12,
        detection_time_ms: 35,
        total_frames_sent: 1200,
    }));
}

#[test]
fn test_roundtrip_payloadless() {
    roundtrip(Message::Ping);
    roundtrip(Message::Pong);
    roundtrip(Message::Error);
}

// ============================================================================
// Wire Compatibility Tests
// ============================================================================

#[test]
fn test_decode_detections_scenario() {
    let json = br#"{"type":"DETECTIONS","timestamp":1700000000000,"data":{"frame_id":7,"detections":[{"x":0.1,"y":0.2,"width":0.3,"height":0.4,"class_name":"person","confidence":0.92}],"processing_time_ms":21}}"#;

    let env = codec::decode(json).expect("decode failed");
    assert_eq!(env.timestamp, 1_700_000_000_000);

    match env.message {
        Message::Detections(set) => {
            assert_eq!(set.frame_id, 7);
            assert_eq!(set.processing_time_ms, 21);
            assert_eq!(set.detections.len(), 1);
            let d = &set.detections[0];
            assert_eq!(d.x, 0.1f32);
            assert_eq!(d.y, 0.2f32);
            assert_eq!(d.width, 0.3f32);
            assert_eq!(d.height, 0.4f32);
            assert_eq!(d.class_name, "person");
            assert_eq!(d.confidence, 0.92f32);
        }
        other => panic!("Expected Detections message, got {:?}", other),
    }
}

#[test]
fn test_decode_server_discover_reply() {
    // Servers answer with their own field names
    let json = br#"{"type": "DISCOVER", "timestamp": 1700000000000, "data": {"server_name": "YOLO Feed Server", "version": "1.0"}}"#;

    let env = codec::decode(json).expect("decode failed");
    match env.message {
        Message::Discover(d) => {
            assert_eq!(d.device_name, "YOLO Feed Server");
            assert_eq!(d.app_version, "1.0");
        }
        other => panic!("Expected Discover message, got {:?}", other),
    }
}

#[test]
fn test_decode_server_pong_without_data() {
    let env = codec::decode(br#"{"type": "PONG", "timestamp": 5}"#).expect("decode failed");
    assert_eq!(env.message_type(), MessageType::Pong);
    assert_eq!(env.timestamp, 5);
}

#[test]
fn test_decode_null_data_on_ping() {
    let env = codec::decode(br#"{"type":"PING","timestamp":5,"data":null}"#).unwrap();
    assert_eq!(env.message, Message::Ping);
}

#[test]
fn test_out_of_range_detection_is_not_rejected() {
    let json = br#"{"type":"DETECTIONS","timestamp":1,"data":{"frame_id":1,"detections":[{"x":-0.5,"y":1.5,"width":2.0,"height":0.4,"class_name":"car","confidence":1.2}],"processing_time_ms":3}}"#;

    let env = codec::decode(json).expect("out-of-range values must still decode");
    match env.message {
        Message::Detections(set) => assert_eq!(set.detections[0].x, -0.5),
        other => panic!("Expected Detections message, got {:?}", other),
    }
}

#[test]
fn test_encoded_tag_strings() {
    let encoded = codec::encode(&Envelope::with_timestamp(Message::Pong, 1)).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(value["type"], "PONG");
    assert_eq!(value["timestamp"], 1);
    assert!(value.get("data").is_none());
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[test]
fn test_not_json() {
    assert_malformed(b"hello world");
    assert_malformed(b"");
    assert_malformed(&[0xFF, 0xFE, 0x00]);
}

#[test]
fn test_truncated_json() {
    assert_malformed(br#"{"type":"PING","timestamp":"#);
}

#[test]
fn test_unknown_tag() {
    assert_malformed(br#"{"type":"HELLO","timestamp":1}"#);
    assert_malformed(br#"{"type":"detections","timestamp":1,"data":{}}"#);
}

#[test]
fn test_missing_payload_for_detections() {
    assert_malformed(br#"{"type":"DETECTIONS","timestamp":1}"#);
    assert_malformed(br#"{"type":"DETECTIONS","timestamp":1,"data":null}"#);
}

#[test]
fn test_payload_shape_mismatch() {
    // METRICS shape under a DETECTIONS tag
    assert_malformed(
        br#"{"type":"DETECTIONS","timestamp":1,"data":{"fps":30.0,"network_latency_ms":1,"detection_time_ms":2,"total_frames_sent":3}}"#,
    );
    // wrong field type
    assert_malformed(
        br#"{"type":"FRAME","timestamp":1,"data":{"frame_id":"seven","width":1,"height":1,"format":"JPEG","quality":80}}"#,
    );
}

#[test]
fn test_payload_not_an_object() {
    assert_malformed(br#"{"type":"METRICS","timestamp":1,"data":[30.0,1,2,3]}"#);
    assert_malformed(br#"{"type":"CONNECT","timestamp":1,"data":"dev"}"#);
}

#[test]
fn test_top_level_not_an_object() {
    assert_malformed(br#"["PING", 1]"#);
    assert_malformed(b"42");
}

#[test]
fn test_positional_envelope_with_payload() {
    assert_malformed(
        br#"["DETECTIONS",1,{"frame_id":1,"detections":[],"processing_time_ms":5}]"#,
    );
}

#[test]
fn test_positional_detection_entry() {
    assert_malformed(
        br#"{"type":"DETECTIONS","timestamp":1,"data":{"frame_id":1,"detections":[[0.1,0.2,0.3,0.4,"person",0.9]],"processing_time_ms":5}}"#,
    );
}

#[test]
fn test_non_string_type_tag() {
    assert_malformed(br#"{"type":5,"timestamp":1}"#);
    assert_malformed(br#"{"type":"PING","timestamp":"1"}"#);
}
