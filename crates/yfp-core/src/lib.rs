//! YFP Core
//!
//! Core types, encoding, and framing primitives for the YFP streaming protocol
//! spoken between a capture device and a detection server.
//!
//! This crate provides:
//! - Protocol message types ([`Message`], [`MessageType`], [`Envelope`])
//! - The JSON envelope codec ([`codec`])
//! - Bulk-stream frame layout helpers ([`framing`])
//! - Timing utilities ([`time`])

pub mod codec;
pub mod error;
pub mod framing;
pub mod time;
pub mod types;

pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use time::Timestamp;
pub use types::*;

/// Default UDP control port and TCP bulk-stream port of a server
pub const DEFAULT_SERVER_PORT: u16 = 8888;

/// Default UDP discovery port
pub const DEFAULT_DISCOVERY_PORT: u16 = 8889;

/// Application/protocol version advertised during discovery
pub const APP_VERSION: &str = "1.0";

/// Encoding format tag sent in FRAME headers
pub const DEFAULT_FRAME_FORMAT: &str = "JPEG";

/// Encoder quality sent in FRAME headers
pub const DEFAULT_FRAME_QUALITY: u8 = 80;

/// Receive buffer size for control-channel datagrams
pub const DEFAULT_DATAGRAM_SIZE: usize = 4096;
