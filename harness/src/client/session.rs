//! Client session: one connection, one receive task, one command at a time
//!
//! Responses are matched to commands purely by ordering. A session writes a
//! command, then waits (bounded) for the next received chunk before it will
//! write another. The response queue is the only state shared with the
//! receive task besides the connection state cell.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channel::{ResponseQueue, response_channel};
use super::connection::Connection;
use super::receiver::receive_loop;
use super::state::{ConnectionState, StateHandle};
use super::stats::SessionStats;
use super::types::{ClientError, ClientIdentity, ResponseMessage};
use crate::config::SessionConfig;

/// Where a session is in its command/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connected,
    Sending,
    AwaitingResponse,
    Disconnected,
}

/// One simulated elevator client
pub struct ClientSession {
    identity: ClientIdentity,
    host: String,
    port: u16,
    config: SessionConfig,
    state: StateHandle,
    phase: SessionPhase,
    connection: Option<Connection>,
    responses: Option<ResponseQueue>,
    receiver: Option<JoinHandle<Result<(), ClientError>>>,
    cancel: CancellationToken,
    /// Send time of the command currently awaiting its response
    pending_since: Option<Instant>,
    stats: SessionStats,
}

impl ClientSession {
    pub fn new(
        identity: ClientIdentity,
        host: impl Into<String>,
        port: u16,
        config: SessionConfig,
    ) -> Self {
        Self {
            identity,
            host: host.into(),
            port,
            config,
            state: StateHandle::new(),
            phase: SessionPhase::Idle,
            connection: None,
            responses: None,
            receiver: None,
            cancel: CancellationToken::new(),
            pending_since: None,
            stats: SessionStats::default(),
        }
    }

    /// Stop this session whenever `parent` is cancelled
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the session may still issue commands
    ///
    /// A peer close noticed by the receive task shows up here lazily.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Connected | SessionPhase::Sending | SessionPhase::AwaitingResponse
        ) && self.state.is_connected()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Snapshot of the session's counters
    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.clone();
        if let Some(queue) = &self.responses {
            stats.reads = queue.reads();
        }
        stats
    }

    /// Open the connection, start the receive task and discard the banner
    ///
    /// On failure the session is left `Disconnected` and must not be used to
    /// send commands.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let addr = format!("{}:{}", self.host, self.port);
        if self.phase != SessionPhase::Idle {
            return Err(ClientError::ConnectFailed {
                addr,
                reason: "session already used".into(),
            });
        }

        let opened = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.state.transition(ConnectionState::Disconnected);
                Err(ClientError::Cancelled)
            }
            result = Connection::open(
                &self.host,
                self.port,
                self.config.connect_timeout,
                self.state.clone(),
            ) => result,
        };
        let mut connection = match opened {
            Ok(connection) => connection,
            Err(ClientError::Cancelled) => {
                info!("Connect to {} cancelled", addr);
                self.phase = SessionPhase::Disconnected;
                return Err(ClientError::Cancelled);
            }
            Err(e) => {
                warn!("Connection error: {}", e);
                self.phase = SessionPhase::Disconnected;
                return Err(e);
            }
        };

        let (sink, queue) = response_channel();
        if let Some(reader) = connection.take_reader() {
            self.receiver = Some(tokio::spawn(receive_loop(
                reader,
                sink,
                self.state.clone(),
                self.cancel.clone(),
                self.config.read_chunk_size,
            )));
        }
        self.connection = Some(connection);
        self.responses = Some(queue);
        self.phase = SessionPhase::Connected;

        if !self.config.settle_delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.phase = SessionPhase::Disconnected;
                    return Err(ClientError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.settle_delay) => {}
            }
        }

        match self.next_message(self.config.banner_timeout).await {
            Ok(banner) => {
                self.stats.banner_received = true;
                debug!("Discarded banner ({} bytes)", banner.len());
                Ok(())
            }
            Err(ClientError::ResponseTimeout(timeout)) => {
                warn!("No banner within {:?}, continuing", timeout);
                Ok(())
            }
            Err(e) => {
                warn!("Connection lost before banner: {}", e);
                self.phase = SessionPhase::Disconnected;
                Err(e)
            }
        }
    }

    /// Write one command; `false` means it was not sent
    ///
    /// Fails fast when the connection is gone, moving the session to
    /// `Disconnected`. Refuses to send while a previous command is still
    /// awaiting its response.
    pub async fn send_command(&mut self, command: &str) -> bool {
        match self.try_send(command).await {
            Ok(()) => true,
            Err(e) if !e.is_fatal() => {
                warn!("Refusing {:?}: {}", command.trim_end(), e);
                false
            }
            Err(e) => {
                warn!("Send error: {}", e);
                false
            }
        }
    }

    async fn try_send(&mut self, command: &str) -> Result<(), ClientError> {
        if self.phase == SessionPhase::AwaitingResponse {
            return Err(ClientError::CommandInFlight);
        }
        if !self.is_connected() {
            self.phase = SessionPhase::Disconnected;
            return Err(ClientError::SendError(format!(
                "connection is {}",
                self.state.get()
            )));
        }
        let Some(connection) = self.connection.as_mut() else {
            self.phase = SessionPhase::Disconnected;
            return Err(ClientError::SendError("no connection".into()));
        };

        self.phase = SessionPhase::Sending;
        info!("Sending: {}", command.trim_end());
        match connection.send(command).await {
            Ok(_) => {
                self.stats.commands_sent += 1;
                self.pending_since = Some(Instant::now());
                self.phase = SessionPhase::AwaitingResponse;
                Ok(())
            }
            Err(e) => {
                self.pending_since = None;
                self.phase = SessionPhase::Disconnected;
                Err(e)
            }
        }
    }

    /// Wait up to `timeout` for the response to the last command
    ///
    /// A timeout is logged and returns `None` without ending the session.
    pub async fn await_response(&mut self, timeout: Duration) -> Option<ResponseMessage> {
        let result = self.next_message(timeout).await;
        let sent_at = self.pending_since.take();
        if self.phase == SessionPhase::AwaitingResponse {
            self.phase = SessionPhase::Connected;
        }

        match result {
            Ok(message) => {
                self.stats.responses_received += 1;
                if let Some(sent_at) = sent_at {
                    self.stats
                        .latencies
                        .record(message.received_at.saturating_duration_since(sent_at));
                }
                info!("Response:\n{}", message.text.trim_end());
                Some(message)
            }
            Err(ClientError::ResponseTimeout(timeout)) => {
                self.stats.response_timeouts += 1;
                warn!("Timeout waiting for response after {:?}", timeout);
                None
            }
            Err(ClientError::Cancelled) => {
                debug!("Stopped waiting for response");
                None
            }
            Err(e) => {
                info!("No response: {}", e);
                self.phase = SessionPhase::Disconnected;
                None
            }
        }
    }

    /// Send `command` and wait for its response using the configured timeout
    pub async fn request(&mut self, command: &str) -> Option<ResponseMessage> {
        if !self.send_command(command).await {
            return None;
        }
        self.await_response(self.config.response_timeout).await
    }

    async fn next_message(&mut self, timeout: Duration) -> Result<ResponseMessage, ClientError> {
        let Some(queue) = self.responses.as_mut() else {
            return Err(ClientError::EndOfStream);
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            result = queue.recv_timeout(timeout) => result,
        }
    }

    /// Stop the receive task and close the connection
    ///
    /// Idempotent: later calls find nothing left to release.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();

        let mut released = false;
        if let Some(mut connection) = self.connection.take() {
            released = connection.close().await;
        }
        if let Some(handle) = self.receiver.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Receive task ended earlier: {}", e),
                Err(e) => warn!("Receive task failed: {}", e),
            }
        }

        self.pending_since = None;
        if self.phase != SessionPhase::Disconnected || released {
            info!("Disconnected");
        }
        self.phase = SessionPhase::Disconnected;
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        // Lets a detached receive task exit if disconnect() was never awaited
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("identity", &self.identity)
            .field("addr", &format_args!("{}:{}", self.host, self.port))
            .field("phase", &self.phase)
            .field("state", &self.state.get())
            .finish()
    }
}
