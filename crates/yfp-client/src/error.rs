//! Client error types
//!
//! These are the errors a consumer can observe through
//! [`ClientEvent::Error`](crate::ClientEvent::Error).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("server discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// The control channel was closed by a disconnect
    #[error("transport closed")]
    TransportClosed,

    /// The control channel failed while the session was still live
    #[error("control channel receive failed: {0}")]
    ReceiveFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<yfp_core::Error> for ClientError {
    fn from(e: yfp_core::Error) -> Self {
        ClientError::MalformedMessage(e.to_string())
    }
}
