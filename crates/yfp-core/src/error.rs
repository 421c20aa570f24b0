//! Error types for YFP

use thiserror::Error;

/// Result type alias for YFP core operations
pub type Result<T> = std::result::Result<T, Error>;

/// YFP core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Inbound text could not be decoded into an envelope
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Envelope could not be serialized
    #[error("encode error: {0}")]
    Encode(String),

    /// Encoded header does not fit the 4-byte length prefix
    #[error("header too large: {0} bytes")]
    HeaderTooLarge(usize),

    /// Length prefix announced an unusable header size
    #[error("invalid header length: {0}")]
    InvalidHeaderLength(u32),

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },
}

impl Error {
    pub(crate) fn malformed(reason: impl std::fmt::Display) -> Self {
        Error::MalformedMessage(reason.to_string())
    }
}
