//! Client configuration

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use yfp_discovery::DiscoveryConfig;

/// Everything a [`StreamClient`](crate::StreamClient) needs to know up front.
///
/// Deserializes from a partial table; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name advertised in DISCOVER requests
    pub device_name: String,
    /// Identifier sent in CONNECT
    pub device_id: String,
    /// Version advertised in DISCOVER requests
    pub app_version: String,
    /// Server control (UDP) and stream (TCP) port
    pub server_port: u16,
    pub discovery_port: u16,
    pub broadcast_addr: IpAddr,
    pub discovery_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Capture resolution reported in CONNECT
    pub resolution_width: u32,
    pub resolution_height: u32,
    /// Format tag sent in every FRAME header
    pub frame_format: String,
    pub frame_quality: u8,
    /// Largest control datagram accepted
    pub recv_buffer_size: usize,
    /// Size of the background worker pool
    pub worker_threads: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_name: "YFP Device".to_string(),
            device_id: "yfp-device".to_string(),
            app_version: yfp_core::APP_VERSION.to_string(),
            server_port: yfp_core::DEFAULT_SERVER_PORT,
            discovery_port: yfp_core::DEFAULT_DISCOVERY_PORT,
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            discovery_timeout_ms: 5000,
            connect_timeout_ms: 5000,
            resolution_width: 1920,
            resolution_height: 1080,
            frame_format: yfp_core::DEFAULT_FRAME_FORMAT.to_string(),
            frame_quality: yfp_core::DEFAULT_FRAME_QUALITY,
            recv_buffer_size: yfp_core::DEFAULT_DATAGRAM_SIZE,
            worker_threads: 3,
        }
    }
}

impl ClientConfig {
    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            broadcast_addr: self.broadcast_addr,
            port: self.discovery_port,
            timeout: Duration::from_millis(self.discovery_timeout_ms),
            device_name: self.device_name.clone(),
            app_version: self.app_version.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
