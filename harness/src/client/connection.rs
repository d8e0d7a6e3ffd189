//! TCP connection to the elevator server

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, warn};

use super::state::{ConnectionState, StateHandle};
use super::types::ClientError;

/// One TCP stream to the server
///
/// The read half is handed to the receive task once; the write half stays
/// here for outbound commands. Both are released at most once.
#[derive(Debug)]
pub struct Connection {
    peer: SocketAddr,
    reader: Option<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    state: StateHandle,
}

impl Connection {
    /// Open a stream to `host:port` within `connect_timeout`
    ///
    /// `state` moves to `Connecting`, then to `Connected` on success or back to
    /// `Disconnected` on failure. No retry is attempted.
    pub async fn open(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        state: StateHandle,
    ) -> Result<Self, ClientError> {
        let addr = format!("{}:{}", host, port);
        state.transition(ConnectionState::Connecting);
        debug!("Connecting to {}", addr);

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                state.transition(ConnectionState::Disconnected);
                return Err(ClientError::ConnectFailed {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                state.transition(ConnectionState::Disconnected);
                return Err(ClientError::ConnectTimeout {
                    addr,
                    timeout: connect_timeout,
                });
            }
        };

        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(e) => {
                state.transition(ConnectionState::Disconnected);
                return Err(ClientError::ConnectFailed {
                    addr,
                    reason: e.to_string(),
                });
            }
        };
        // Commands are tiny and latency matters more than batching
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on {}: {}", peer, e);
        }

        let (reader, writer) = stream.into_split();
        state.transition(ConnectionState::Connected);
        info!("Connected to {}", peer);

        Ok(Self {
            peer,
            reader: Some(reader),
            writer: Some(writer),
            state,
        })
    }

    /// Hand the read half to the receive task; `None` after the first call
    pub fn take_reader(&mut self) -> Option<OwnedReadHalf> {
        self.reader.take()
    }

    /// Write one command line
    ///
    /// Exactly one trailing newline is transmitted. On failure the connection
    /// is closed and must be treated as dead.
    pub async fn send(&mut self, command: &str) -> Result<usize, ClientError> {
        if !self.state.is_connected() {
            return Err(ClientError::SendError(format!(
                "connection is {}",
                self.state.get()
            )));
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(ClientError::SendError("write half released".into()));
        };

        let line = with_trailing_newline(command);
        match writer.write_all(line.as_bytes()).await {
            Ok(()) => {
                debug!(bytes = line.len(), "Sent {:?} to {}", line.trim_end(), self.peer);
                Ok(line.len())
            }
            Err(e) => {
                warn!("Write to {} failed: {}", self.peer, e);
                self.writer = None;
                self.state.mark_closed();
                Err(ClientError::SendError(e.to_string()))
            }
        }
    }

    /// Release the stream; safe to call repeatedly and from any state
    ///
    /// Returns whether this call released the write half.
    pub async fn close(&mut self) -> bool {
        self.reader = None;
        let released = match self.writer.take() {
            Some(mut writer) => {
                if let Err(e) = writer.shutdown().await {
                    debug!("Shutdown of {} reported: {}", self.peer, e);
                }
                true
            }
            None => false,
        };
        if self.state.mark_closed() {
            info!("Closed connection to {}", self.peer);
        }
        released
    }
}

/// Append a newline unless the command already ends with one
pub fn with_trailing_newline(command: &str) -> Cow<'_, str> {
    if command.ends_with('\n') {
        Cow::Borrowed(command)
    } else {
        Cow::Owned(format!("{}\n", command))
    }
}
