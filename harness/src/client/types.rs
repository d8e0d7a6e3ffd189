//! Client-side types and error definitions

use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur while a client talks to the elevator server
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed { addr: String, reason: String },

    #[error("Timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Send failed: {0}")]
    SendError(String),

    #[error("A command is already awaiting its response")]
    CommandInFlight,

    #[error("Receive failed: {0}")]
    ReceiveError(String),

    #[error("Server closed the connection")]
    EndOfStream,

    #[error("No response within {0:?}")]
    ResponseTimeout(Duration),

    #[error("Session was cancelled")]
    Cancelled,
}

impl ClientError {
    /// Whether the owning connection must be treated as dead after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ClientError::ResponseTimeout(_) | ClientError::CommandInFlight
        )
    }
}

/// Display labels handed out round-robin to clients
const CLIENT_LABELS: &[&str] = &[
    "red", "green", "yellow", "blue", "magenta", "cyan", "white",
];

/// Identity of one simulated client, used for log attribution only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub id: usize,
    pub label: &'static str,
}

impl ClientIdentity {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            label: CLIENT_LABELS[id % CLIENT_LABELS.len()],
        }
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{} ({})", self.id, self.label)
    }
}

/// One raw chunk received from the server
///
/// A chunk is whatever a single read returned: it may hold a partial logical
/// message or several of them.
#[derive(Debug, Clone)]
pub struct ResponseMessage {
    pub text: String,
    pub received_at: Instant,
}

impl ResponseMessage {
    /// Decode a received chunk, replacing invalid UTF-8 sequences
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(bytes).into_owned(),
            received_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
