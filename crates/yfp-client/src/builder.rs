//! Client builder pattern

use std::net::IpAddr;

use crate::{ClientConfig, EventReceiver, Result, StreamClient};

/// Builder for [`StreamClient`]
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the name advertised during discovery
    pub fn device_name(mut self, name: &str) -> Self {
        self.config.device_name = name.to_string();
        self
    }

    /// Set the identifier sent in CONNECT
    pub fn device_id(mut self, id: &str) -> Self {
        self.config.device_id = id.to_string();
        self
    }

    /// Set the capture resolution reported in CONNECT
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.config.resolution_width = width;
        self.config.resolution_height = height;
        self
    }

    /// Set the server control and stream port
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    pub fn discovery_port(mut self, port: u16) -> Self {
        self.config.discovery_port = port;
        self
    }

    /// Where discovery requests are sent
    pub fn broadcast_addr(mut self, addr: IpAddr) -> Self {
        self.config.broadcast_addr = addr;
        self
    }

    /// Set the discovery timeout in milliseconds
    pub fn discovery_timeout(mut self, ms: u64) -> Self {
        self.config.discovery_timeout_ms = ms;
        self
    }

    /// Set the stream connect timeout in milliseconds
    pub fn connect_timeout(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the format tag and quality sent with every frame
    pub fn frame_format(mut self, format: &str, quality: u8) -> Self {
        self.config.frame_format = format.to_string();
        self.config.frame_quality = quality;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start the worker pool and return the client with its event queue
    pub fn build(self) -> Result<(StreamClient, EventReceiver)> {
        StreamClient::new(self.config)
    }
}
