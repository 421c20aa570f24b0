//! Control-channel receive loop
//!
//! Runs for the lifetime of one session. Each datagram is decoded and
//! dispatched: DETECTIONS and METRICS go to the consumer, PING is answered
//! with PONG, anything undecodable is logged and skipped. The loop ends when
//! the connection state leaves `Connected` or the socket fails.

use std::net::SocketAddr;
use tracing::{debug, error, info, trace, warn};
use yfp_core::time::millis_since;
use yfp_core::{codec, DetectionSet, Envelope, Message};
use yfp_transport::UdpTransport;

use crate::error::ClientError;
use crate::events::{ClientEvent, EventSink};
use crate::state::StateWatch;

pub(crate) struct ReceiveLoop {
    pub(crate) control: UdpTransport,
    /// Where PONG replies go
    pub(crate) server: SocketAddr,
    pub(crate) state: StateWatch,
    pub(crate) events: EventSink,
}

impl ReceiveLoop {
    pub(crate) async fn run(mut self) {
        match self.listen().await {
            ClientError::TransportClosed => debug!("Control listener stopped"),
            err => {
                error!("Control listener failed: {}", err);
                self.events.post(ClientEvent::Error(err));
            }
        }
    }

    /// Receive until the session ends, returning why it ended
    async fn listen(&mut self) -> ClientError {
        let mut buf = vec![0u8; self.control.recv_buffer_size()];

        if let Ok(local) = self.control.local_addr() {
            info!("Control listener started on {}", local);
        }

        while self.state.is_connected() {
            let received = tokio::select! {
                biased;
                _ = self.state.left_connected() => return ClientError::TransportClosed,
                received = self.control.recv_from(&mut buf) => received,
            };

            // Nothing is dispatched once the session has ended
            if !self.state.is_connected() {
                return ClientError::TransportClosed;
            }

            match received {
                Ok((len, from)) => {
                    if let Err(e) = self.handle_datagram(&buf[..len]).await {
                        warn!("Skipping datagram from {}: {}", from, e);
                    }
                }
                Err(e) => return ClientError::ReceiveFailed(e.to_string()),
            }
        }

        ClientError::TransportClosed
    }

    async fn handle_datagram(&self, data: &[u8]) -> Result<(), ClientError> {
        let envelope = codec::decode(data)?;
        self.dispatch(envelope).await;
        Ok(())
    }

    async fn dispatch(&self, envelope: Envelope) {
        match envelope.message {
            Message::Detections(set) => {
                debug!(
                    "Detections for frame {}: {} objects, {} ms in flight",
                    set.frame_id,
                    set.detections.len(),
                    millis_since(envelope.timestamp)
                );
                check_bounds(&set);
                self.events.post(ClientEvent::Detections(set));
            }
            Message::Metrics(sample) => {
                trace!("Metrics: {:.1} fps", sample.fps);
                self.events.post(ClientEvent::Metrics(sample));
            }
            Message::Ping => self.send_pong().await,
            other => trace!("Ignoring {} on control channel", other.type_name()),
        }
    }

    async fn send_pong(&self) {
        let pong = match codec::encode_message(Message::Pong) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode PONG: {}", e);
                return;
            }
        };

        match self.control.send_to(&pong, self.server).await {
            Ok(()) => trace!("Answered PING from {}", self.server),
            Err(e) => warn!("Failed to send PONG to {}: {}", self.server, e),
        }
    }
}

/// Detections outside the unit square are passed on unchanged, only logged
fn check_bounds(set: &DetectionSet) {
    for detection in &set.detections {
        if let Some(issue) = detection.bounds_issue() {
            warn!(
                "Frame {}: {} detection at ({}, {}) size {}x{}: {}",
                set.frame_id,
                detection.class_name,
                detection.x,
                detection.y,
                detection.width,
                detection.height,
                issue
            );
        }
    }
}
