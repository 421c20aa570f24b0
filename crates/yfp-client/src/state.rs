//! Connection state
//!
//! The state lives in a `watch` channel. [`StateCell`] is the single writer
//! and belongs to the connection manager; the frame transmitter and the
//! receive loop hold [`StateWatch`] views that can only read and wait.
//!
//! Every ended session bumps an epoch alongside the state. A view is bound
//! to the epoch it was created in, so a loop from an old session never
//! mistakes a newer session's `Connected` for its own.

use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// Lifecycle of a client's connection to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Discovering,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Discovering => "discovering",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Phase {
    state: ConnectionState,
    epoch: u64,
}

impl Phase {
    fn is_live(&self, epoch: u64) -> bool {
        self.state.is_connected() && self.epoch == epoch
    }
}

/// Owning side of the connection state
pub(crate) struct StateCell {
    tx: watch::Sender<Phase>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(Phase {
            state: ConnectionState::Idle,
            epoch: 0,
        });
        Self { tx }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        self.tx.borrow().state
    }

    /// Sessions ended so far
    pub(crate) fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    /// Unconditionally set the state
    pub(crate) fn set(&self, next: ConnectionState) {
        self.set_if(|_| true, next);
    }

    /// Move to `next` only if the current state satisfies `allowed`
    pub(crate) fn set_if(
        &self,
        allowed: impl FnOnce(ConnectionState) -> bool,
        next: ConnectionState,
    ) -> bool {
        self.tx.send_if_modified(|phase| {
            if allowed(phase.state) && phase.state != next {
                debug!("Connection state {} -> {}", phase.state, next);
                phase.state = next;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Disconnected` and invalidate every view of the current epoch
    pub(crate) fn end_session(&self) {
        self.tx.send_modify(|phase| {
            if phase.state != ConnectionState::Disconnected {
                debug!("Connection state {} -> disconnected", phase.state);
            }
            phase.state = ConnectionState::Disconnected;
            phase.epoch += 1;
        });
    }

    /// A view bound to the current epoch
    pub(crate) fn watch(&self) -> StateWatch {
        let rx = self.tx.subscribe();
        let epoch = rx.borrow().epoch;
        StateWatch { rx, epoch }
    }
}

/// Read-only view of the connection state for one session
#[derive(Clone)]
pub(crate) struct StateWatch {
    rx: watch::Receiver<Phase>,
    epoch: u64,
}

impl StateWatch {
    /// Whether this view's session is still the live one
    pub(crate) fn is_connected(&self) -> bool {
        self.rx.borrow().is_live(self.epoch)
    }

    /// Resolves once this view's session is no longer live
    pub(crate) async fn left_connected(&mut self) {
        let epoch = self.epoch;
        // An error means the owning cell is gone, which also ends the session
        let _ = self.rx.wait_for(|phase| !phase.is_live(epoch)).await;
    }
}
