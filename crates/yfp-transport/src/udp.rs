//! UDP transport implementation

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// UDP configuration
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Buffer size for receiving
    pub recv_buffer_size: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: yfp_core::DEFAULT_DATAGRAM_SIZE,
        }
    }
}

/// UDP transport (connectionless).
///
/// Cloning shares the underlying socket; the socket closes when the last
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    config: UdpConfig,
}

impl UdpTransport {
    /// Bind to a local address
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_config(addr, UdpConfig::default()).await
    }

    /// Bind with config
    pub async fn bind_with_config(addr: &str, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if let Ok(local) = socket.local_addr() {
            info!("UDP bound to {}", local);
        }

        Ok(Self {
            socket: Arc::new(socket),
            config,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(TransportError::Io)
    }

    /// Configured receive buffer size
    pub fn recv_buffer_size(&self) -> usize {
        self.config.recv_buffer_size
    }

    /// Enable broadcast
    pub fn set_broadcast(&self, enable: bool) -> Result<()> {
        self.socket.set_broadcast(enable).map_err(TransportError::Io)
    }

    /// Send to a specific address
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        self.socket
            .send_to(data, target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        debug!("UDP sent {} bytes to {}", data.len(), target);
        Ok(())
    }

    /// Receive one datagram into `buf`
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (len, from) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        debug!("UDP received {} bytes from {}", len, from);
        Ok((len, from))
    }
}
