//! UDP broadcast discovery

use crate::{DiscoveredServer, DiscoveryConfig, DiscoveryError, Result};
use yfp_core::{codec, DiscoverData, Envelope, Message};
use yfp_transport::UdpTransport;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Discover a YFP server via UDP broadcast.
///
/// Sends one DISCOVER request and waits up to `config.timeout` for the first
/// DISCOVER reply. Other datagrams are skipped. The socket lives only for
/// the duration of this call.
pub async fn discover(config: &DiscoveryConfig) -> Result<DiscoveredServer> {
    // Bind to any available port
    let transport = UdpTransport::bind("0.0.0.0:0").await?;

    transport
        .set_broadcast(true)
        .map_err(|e| DiscoveryError::Broadcast(e.to_string()))?;

    let request = codec::encode(&Envelope::new(Message::Discover(DiscoverData {
        device_name: config.device_name.clone(),
        app_version: config.app_version.clone(),
    })))?;

    let target = config.target();
    info!("Broadcasting discovery request to {}", target);

    transport
        .send_to(&request, target)
        .await
        .map_err(|e| DiscoveryError::Broadcast(e.to_string()))?;

    let deadline = Instant::now() + config.timeout;
    let mut buf = vec![0u8; transport.recv_buffer_size()];

    loop {
        let (len, from) = match timeout_at(deadline, transport.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => {
                debug!("Broadcast discovery timeout");
                return Err(DiscoveryError::Timeout(config.timeout));
            }
        };

        match codec::decode(&buf[..len]) {
            Ok(Envelope {
                message: Message::Discover(info),
                ..
            }) => {
                info!("Discovered server {} at {}", info.device_name, from);
                return Ok(DiscoveredServer { addr: from, info });
            }
            Ok(other) => {
                debug!("Ignoring {} from {} during discovery", other.message_type(), from);
            }
            Err(e) => {
                debug!("Failed to decode response from {}: {}", from, e);
            }
        }
    }
}

/// Respond to broadcast discovery requests
pub struct BroadcastResponder {
    transport: UdpTransport,
    name: String,
    version: String,
}

impl BroadcastResponder {
    /// Create a new broadcast responder
    pub async fn bind(addr: &str, name: String, version: String) -> Result<Self> {
        let transport = UdpTransport::bind(addr).await?;

        info!("Broadcast responder listening on {}", transport.local_addr()?);

        Ok(Self {
            transport,
            name,
            version,
        })
    }

    /// Local address the responder listens on
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.transport.local_addr()?)
    }

    /// Answer discovery requests until the socket fails
    pub async fn run(&self) -> Result<()> {
        let mut buf = vec![0u8; self.transport.recv_buffer_size()];

        loop {
            let (len, from) = self.transport.recv_from(&mut buf).await?;

            match codec::decode(&buf[..len]) {
                Ok(Envelope {
                    message: Message::Discover(request),
                    ..
                }) => {
                    debug!(
                        "Discovery request from {} ({} v{})",
                        from, request.device_name, request.app_version
                    );

                    let reply = Envelope::new(Message::Discover(DiscoverData {
                        device_name: self.name.clone(),
                        app_version: self.version.clone(),
                    }));

                    match codec::encode(&reply) {
                        Ok(response) => {
                            if let Err(e) = self.transport.send_to(&response, from).await {
                                warn!("Failed to answer discovery from {}: {}", from, e);
                            }
                        }
                        Err(e) => warn!("Failed to encode discovery reply: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Ignoring undecodable datagram from {}: {}", from, e);
                }
            }
        }
    }
}
