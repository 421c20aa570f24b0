//! YFP Envelope Codec
//!
//! Envelopes travel as JSON text:
//!
//! ```text
//! {"type": "DETECTIONS", "timestamp": 1712345678901, "data": { ... }}
//! ```
//!
//! Encoding writes the fields in that fixed order and omits `data` for
//! payload-less types. Decoding reads the `type` tag first and only then
//! materializes `data` as the record that tag requires.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::*;
use crate::{Error, Result};

/// Outbound wire shape, borrowing the payload
#[derive(Serialize)]
struct WireEnvelope<'a> {
    #[serde(rename = "type")]
    msg_type: MessageType,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<WirePayload<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePayload<'a> {
    Discover(&'a DiscoverData),
    Connect(&'a ConnectData),
    Frame(&'a FrameHeader),
    Detections(&'a DetectionSet),
    Metrics(&'a MetricsSample),
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Encode an envelope to its JSON wire form
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    let data = match &envelope.message {
        Message::Discover(d) => Some(WirePayload::Discover(d)),
        Message::Connect(c) => Some(WirePayload::Connect(c)),
        Message::Frame(f) => Some(WirePayload::Frame(f)),
        Message::Detections(d) => Some(WirePayload::Detections(d)),
        Message::Metrics(m) => Some(WirePayload::Metrics(m)),
        Message::Ping | Message::Pong | Message::Error => None,
    };

    let wire = WireEnvelope {
        msg_type: envelope.message_type(),
        timestamp: envelope.timestamp,
        data,
    };

    serde_json::to_vec(&wire).map_err(|e| Error::Encode(e.to_string()))
}

/// Encode a message stamped with the current time
pub fn encode_message(message: Message) -> Result<Vec<u8>> {
    encode(&Envelope::new(message))
}

/// Decode an envelope from its JSON wire form
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    // Only a JSON object is an envelope
    let mut fields = match serde_json::from_slice::<Value>(bytes).map_err(Error::malformed)? {
        Value::Object(fields) => fields,
        other => {
            return Err(Error::MalformedMessage(format!(
                "envelope must be an object, got {}",
                json_kind(&other)
            )))
        }
    };

    let msg_type: MessageType = match fields.get("type") {
        Some(Value::String(tag)) => tag.parse()?,
        Some(other) => {
            return Err(Error::MalformedMessage(format!(
                "type must be a string, got {}",
                json_kind(other)
            )))
        }
        None => return Err(Error::MalformedMessage("missing type".into())),
    };

    let timestamp = fields
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::MalformedMessage("missing or non-integer timestamp".into()))?;

    let data = fields.remove("data");

    let message = match msg_type {
        MessageType::Discover => Message::Discover(payload(msg_type, data)?),
        MessageType::Connect => Message::Connect(payload(msg_type, data)?),
        MessageType::Frame => Message::Frame(payload(msg_type, data)?),
        MessageType::Detections => {
            if let Some(data) = &data {
                check_detection_entries(data)?;
            }
            Message::Detections(payload(msg_type, data)?)
        }
        MessageType::Metrics => Message::Metrics(payload(msg_type, data)?),
        MessageType::Ping => Message::Ping,
        MessageType::Pong => Message::Pong,
        MessageType::Error => Message::Error,
    };

    Ok(Envelope { timestamp, message })
}

/// Each detection must be an object, never a positional array
fn check_detection_entries(data: &Value) -> Result<()> {
    let Some(Value::Array(entries)) = data.get("detections") else {
        // Shape errors are reported by the typed decode
        return Ok(());
    };

    match entries.iter().find(|entry| !entry.is_object()) {
        Some(entry) => Err(Error::MalformedMessage(format!(
            "DETECTIONS entry must be an object, got {}",
            json_kind(entry)
        ))),
        None => Ok(()),
    }
}

/// Materialize `data` as the record required by `msg_type`
fn payload<T: DeserializeOwned>(msg_type: MessageType, data: Option<Value>) -> Result<T> {
    match data {
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map_err(|e| Error::MalformedMessage(format!("{} payload: {}", msg_type, e))),
        Some(Value::Null) | None => Err(Error::MalformedMessage(format!(
            "{} requires a payload",
            msg_type
        ))),
        Some(other) => Err(Error::MalformedMessage(format!(
            "{} payload must be an object, got {}",
            msg_type,
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
