//! Background receive loop, one per connection

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channel::ResponseSink;
use super::state::StateHandle;
use super::types::{ClientError, ResponseMessage};

/// Read chunks from `reader` into `sink` until cancelled, closed or failed
///
/// Each read becomes one `ResponseMessage`; no line splitting is done. Every
/// exit other than cancellation moves `state` to `Closed` before returning.
pub async fn receive_loop(
    mut reader: OwnedReadHalf,
    sink: ResponseSink,
    state: StateHandle,
    cancel: CancellationToken,
    chunk_size: usize,
) -> Result<(), ClientError> {
    let mut buf = BytesMut::with_capacity(chunk_size);

    loop {
        buf.clear();
        buf.reserve(chunk_size);
        let mut chunk = (&mut reader).take(chunk_size as u64);

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Receive loop stopped");
                return Ok(());
            }
            read = chunk.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                state.mark_closed();
                info!("Server closed the connection");
                return Err(ClientError::EndOfStream);
            }
            Ok(n) => {
                let message = ResponseMessage::from_bytes(&buf[..n]);
                debug!(bytes = n, "Received {:?}", message.text);
                if !sink.push(message) {
                    // Session is gone; nobody will read further chunks
                    debug!("Response queue dropped, stopping receive loop");
                    return Ok(());
                }
            }
            Err(e) => {
                if !cancel.is_cancelled() {
                    warn!("Receive error: {}", e);
                }
                state.mark_closed();
                return Err(ClientError::ReceiveError(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::channel::response_channel;
    use crate::client::state::ConnectionState;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn connected_pair() -> (TcpStream, TcpStream, StateHandle) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let state = StateHandle::new();
        state.transition(ConnectionState::Connecting);
        state.transition(ConnectionState::Connected);
        (client.unwrap(), accepted.unwrap().0, state)
    }

    #[tokio::test]
    async fn test_eof_closes_state() {
        let (client, server, state) = connected_pair().await;
        let (reader, _writer) = client.into_split();
        let (sink, mut queue) = response_channel();
        let task = tokio::spawn(receive_loop(
            reader,
            sink,
            state.clone(),
            CancellationToken::new(),
            4096,
        ));

        let mut server = server;
        server.write_all(b"Welcome\n").await.unwrap();
        let banner = queue.recv_timeout(Duration::from_secs(2)).await.unwrap();
        assert_eq!(banner.text, "Welcome\n");

        drop(server);
        assert_eq!(task.await.unwrap(), Err(ClientError::EndOfStream));
        assert_eq!(state.get(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_reset_reports_receive_error() {
        let (client, server, state) = connected_pair().await;
        let (reader, _writer) = client.into_split();
        let (sink, _queue) = response_channel();
        let task = tokio::spawn(receive_loop(
            reader,
            sink,
            state.clone(),
            CancellationToken::new(),
            4096,
        ));

        // Zero linger turns the close into a RST
        server.set_linger(Some(Duration::ZERO)).unwrap();
        drop(server);

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("receive loop should stop on reset")
            .unwrap();
        assert!(matches!(result, Err(ClientError::ReceiveError(_))), "{:?}", result);
        assert_eq!(state.get(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_cancel_stops_promptly() {
        let (client, _server, state) = connected_pair().await;
        let (reader, _writer) = client.into_split();
        let (sink, _queue) = response_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            reader,
            sink,
            state.clone(),
            cancel.clone(),
            4096,
        ));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("receive loop should observe cancellation");
        assert_eq!(result.unwrap(), Ok(()));
        assert_eq!(state.get(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_reads_bounded_by_chunk_size() {
        let (client, mut server, state) = connected_pair().await;
        let (reader, _writer) = client.into_split();
        let (sink, mut queue) = response_channel();
        let _task = tokio::spawn(receive_loop(
            reader,
            sink,
            state,
            CancellationToken::new(),
            4,
        ));

        server.write_all(b"abcdefghij").await.unwrap();

        let mut collected = String::new();
        while collected.len() < 10 {
            let msg = queue.recv_timeout(Duration::from_secs(2)).await.unwrap();
            assert!(msg.len() <= 4);
            collected.push_str(&msg.text);
        }
        assert_eq!(collected, "abcdefghij");
        assert!(queue.reads() >= 3);
    }
}
