//! Protocol types and message definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::time::{now_millis, Timestamp};

/// Envelope type tags as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Discover,
    Connect,
    Frame,
    Detections,
    Metrics,
    Ping,
    Pong,
    Error,
}

impl MessageType {
    /// All tags, in wire declaration order
    pub const ALL: [MessageType; 8] = [
        MessageType::Discover,
        MessageType::Connect,
        MessageType::Frame,
        MessageType::Detections,
        MessageType::Metrics,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::Error,
    ];

    /// The wire tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Discover => "DISCOVER",
            MessageType::Connect => "CONNECT",
            MessageType::Frame => "FRAME",
            MessageType::Detections => "DETECTIONS",
            MessageType::Metrics => "METRICS",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Error => "ERROR",
        }
    }

    /// Whether envelopes of this type carry a `data` record
    pub fn has_payload(&self) -> bool {
        !matches!(
            self,
            MessageType::Ping | MessageType::Pong | MessageType::Error
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::MalformedMessage(format!("unknown message type: {}", s)))
    }
}

/// Discovery exchange payload.
///
/// Servers answer with `server_name`/`version`; those names are accepted as
/// aliases so both directions decode into the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverData {
    #[serde(alias = "server_name")]
    pub device_name: String,
    #[serde(alias = "version")]
    pub app_version: String,
}

/// Session request sent once per connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectData {
    pub device_id: String,
    pub resolution_width: u32,
    pub resolution_height: u32,
}

/// Metadata preceding each raw payload on the bulk stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub frame_id: i64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub quality: u8,
}

/// One detected object, coordinates normalized to the image size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub class_name: String,
    pub confidence: f32,
}

/// Why a detection box falls outside the unit square
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsIssue {
    /// A coordinate or extent lies outside [0, 1]
    OutOfRange,
    /// The box extends past the right or bottom edge
    ExceedsImage,
}

impl fmt::Display for BoundsIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsIssue::OutOfRange => f.write_str("coordinates outside [0, 1]"),
            BoundsIssue::ExceedsImage => f.write_str("box extends beyond image bounds"),
        }
    }
}

impl Detection {
    /// Check the box against the unit square. Never modifies the detection.
    pub fn bounds_issue(&self) -> Option<BoundsIssue> {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(unit(self.x) && unit(self.y) && unit(self.width) && unit(self.height)) {
            Some(BoundsIssue::OutOfRange)
        } else if self.x + self.width > 1.0 || self.y + self.height > 1.0 {
            Some(BoundsIssue::ExceedsImage)
        } else {
            None
        }
    }
}

/// Server results for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSet {
    pub frame_id: i64,
    pub detections: Vec<Detection>,
    pub processing_time_ms: i64,
}

/// Server-side performance telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub fps: f32,
    pub network_latency_ms: i64,
    pub detection_time_ms: i64,
    pub total_frames_sent: i64,
}

/// All YFP messages. The variant fixes the payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Discover(DiscoverData),
    Connect(ConnectData),
    Frame(FrameHeader),
    Detections(DetectionSet),
    Metrics(MetricsSample),
    Ping,
    Pong,
    Error,
}

impl Message {
    /// Get the wire tag for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Discover(_) => MessageType::Discover,
            Message::Connect(_) => MessageType::Connect,
            Message::Frame(_) => MessageType::Frame,
            Message::Detections(_) => MessageType::Detections,
            Message::Metrics(_) => MessageType::Metrics,
            Message::Ping => MessageType::Ping,
            Message::Pong => MessageType::Pong,
            Message::Error => MessageType::Error,
        }
    }

    /// Get the message type name
    pub fn type_name(&self) -> &'static str {
        self.message_type().as_str()
    }
}

/// The top-level wire unit: a message plus its creation time
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub timestamp: Timestamp,
    pub message: Message,
}

impl Envelope {
    /// Wrap a message, stamped with the current wall clock
    pub fn new(message: Message) -> Self {
        Self {
            timestamp: now_millis(),
            message,
        }
    }

    /// Wrap a message with an explicit timestamp
    pub fn with_timestamp(message: Message, timestamp: Timestamp) -> Self {
        Self { timestamp, message }
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Envelope::new(message)
    }
}
