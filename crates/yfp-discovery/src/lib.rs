//! YFP Discovery
//!
//! Locates a YFP server on the local network with a one-shot UDP broadcast:
//! the client broadcasts a DISCOVER envelope on the discovery port and the
//! first server to answer with its own DISCOVER envelope wins. The server's
//! address is taken from the reply's source, never from its payload.

pub mod broadcast;
pub mod error;

pub use broadcast::{discover, BroadcastResponder};
pub use error::{DiscoveryError, Result};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use yfp_core::DiscoverData;

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Destination of the request (limited broadcast by default)
    pub broadcast_addr: IpAddr,
    /// Discovery port
    pub port: u16,
    /// How long to wait for a reply
    pub timeout: Duration,
    /// Name advertised in the request
    pub device_name: String,
    /// Version advertised in the request
    pub app_version: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: yfp_core::DEFAULT_DISCOVERY_PORT,
            timeout: Duration::from_secs(5),
            device_name: "YFP Device".to_string(),
            app_version: yfp_core::APP_VERSION.to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// Socket address the request is sent to
    pub fn target(&self) -> SocketAddr {
        SocketAddr::new(self.broadcast_addr, self.port)
    }
}

/// A server that answered a discovery request
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredServer {
    /// Source address of the reply
    pub addr: SocketAddr,
    /// What the server said about itself
    pub info: DiscoverData,
}

impl DiscoveredServer {
    /// The server's network address
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }
}
