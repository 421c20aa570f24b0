//! Consumer-facing events
//!
//! Background tasks never call into consumer code. They post
//! [`ClientEvent`]s onto a queue and the consumer drains it from whichever
//! single thread it chooses, either by matching events directly or by
//! handing them to a [`ClientHandler`].

use std::net::IpAddr;
use std::sync::mpsc;
use std::time::Duration;
use tracing::trace;
use yfp_core::{DetectionSet, MetricsSample};

use crate::error::ClientError;

/// Something the client wants the consumer to know about
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Discovery found a server at this address
    ServerDiscovered(IpAddr),
    Connected,
    Disconnected,
    Detections(DetectionSet),
    Metrics(MetricsSample),
    Error(ClientError),
}

impl ClientEvent {
    /// Invoke the matching handler method
    pub fn dispatch<H: ClientHandler + ?Sized>(self, handler: &mut H) {
        match self {
            ClientEvent::ServerDiscovered(ip) => handler.on_server_discovered(ip),
            ClientEvent::Connected => handler.on_connected(),
            ClientEvent::Disconnected => handler.on_disconnected(),
            ClientEvent::Detections(set) => handler.on_detections(set),
            ClientEvent::Metrics(sample) => handler.on_metrics(sample),
            ClientEvent::Error(error) => handler.on_error(error),
        }
    }
}

/// Callback interface for consumers that prefer methods over matching.
///
/// Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait ClientHandler {
    fn on_server_discovered(&mut self, server: IpAddr) {}
    fn on_connected(&mut self) {}
    fn on_disconnected(&mut self) {}
    fn on_detections(&mut self, detections: DetectionSet) {}
    fn on_metrics(&mut self, metrics: MetricsSample) {}
    fn on_error(&mut self, error: ClientError) {}
}

/// Producer side of the event queue, shared by background tasks
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl EventSink {
    pub(crate) fn post(&self, event: ClientEvent) {
        if let Err(mpsc::SendError(event)) = self.tx.send(event) {
            trace!("Event receiver gone, dropping {:?}", event);
        }
    }
}

/// Consumer side of the event queue
pub struct EventReceiver {
    rx: mpsc::Receiver<ClientEvent>,
}

impl EventReceiver {
    /// Block until the next event. Returns `None` once the client is gone
    /// and the queue is empty.
    pub fn recv(&self) -> Option<ClientEvent> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&self) -> Option<ClientEvent> {
        self.rx.try_recv().ok()
    }

    /// Hand every queued event to `handler`, in order, on the calling
    /// thread. Returns how many were dispatched.
    pub fn dispatch_pending<H: ClientHandler + ?Sized>(&self, handler: &mut H) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            event.dispatch(handler);
            count += 1;
        }
        count
    }
}

pub(crate) fn channel() -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (EventSink { tx }, EventReceiver { rx })
}
