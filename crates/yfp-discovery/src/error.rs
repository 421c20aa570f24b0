//! Discovery error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("no server answered within {0:?}")]
    Timeout(std::time::Duration),

    #[error("broadcast error: {0}")]
    Broadcast(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("codec error: {0}")]
    Codec(#[from] yfp_core::Error),
}

impl From<yfp_transport::TransportError> for DiscoveryError {
    fn from(e: yfp_transport::TransportError) -> Self {
        DiscoveryError::Network(e.to_string())
    }
}
