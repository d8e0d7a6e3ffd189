//! Connection state machine shared between a session and its receive task

use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of one client connection
///
/// `Disconnected --connect--> Connecting --ok--> Connected --close/eof/error--> Closed`.
/// A failed connect falls back to `Disconnected`. There is no reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl ConnectionState {
    /// Whether commands may be written in this state
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connecting, ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Shared handle to a connection's state
///
/// Cloned into the receive task so a peer close or read error is visible to
/// the session the next time it checks before sending.
#[derive(Debug, Clone)]
pub struct StateHandle {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.get().is_connected()
    }

    /// Apply `next` if it is a legal transition from the current state
    ///
    /// Returns whether the state changed.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Move a live connection to `Closed`; a no-op from any other state
    pub fn mark_closed(&self) -> bool {
        self.transition(ConnectionState::Closed)
    }

}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}
