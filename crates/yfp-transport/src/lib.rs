//! YFP Transport Layer
//!
//! This crate provides the two channels a YFP client speaks over:
//! - UDP (control channel and discovery broadcast)
//! - TCP (bulk stream of length-prefixed frames)

pub mod error;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "udp")]
pub mod udp;

pub use error::{Result, TransportError};

#[cfg(feature = "tcp")]
pub use tcp::{FrameReader, FrameWriter, ReceivedFrame, TcpConfig, TcpTransport};

#[cfg(feature = "udp")]
pub use udp::{UdpConfig, UdpTransport};
