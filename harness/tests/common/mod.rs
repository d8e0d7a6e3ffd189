//! Common Test Utilities for Integration Tests
//!
//! A scriptable stand-in for the elevator server plus config helpers.

#![allow(dead_code)]

use elevator_harness::config::{FleetConfig, PacingConfig, SessionConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const BANNER: &str = "Welcome to the elevator system\n";

/// How the stub server treats each connection
#[derive(Debug, Clone)]
pub struct StubBehavior {
    /// Sent once right after accept
    pub banner: Option<String>,
    /// Answer every command line with `OK`
    pub reply: bool,
    /// Close the connection after this many replies
    pub close_after: Option<usize>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            banner: Some(BANNER.to_string()),
            reply: true,
            close_after: None,
        }
    }
}

impl StubBehavior {
    /// Accepts and logs commands but never answers them
    pub fn silent() -> Self {
        Self {
            reply: false,
            ..Self::default()
        }
    }

    pub fn without_banner() -> Self {
        Self {
            banner: None,
            ..Self::default()
        }
    }

    pub fn closing_after(replies: usize) -> Self {
        Self {
            close_after: Some(replies),
            ..Self::default()
        }
    }
}

/// Line-oriented TCP server on an ephemeral port
pub struct StubServer {
    pub port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(behavior: StubBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let commands = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let handle = {
            let commands = commands.clone();
            let accepted = accepted.clone();
            let active = active.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let stream = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accept = listener.accept() => match accept {
                            Ok((stream, _)) => stream,
                            Err(_) => break,
                        },
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    active.fetch_add(1, Ordering::SeqCst);

                    let behavior = behavior.clone();
                    let commands = commands.clone();
                    let active = active.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, behavior, commands, shutdown).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            port,
            commands,
            accepted,
            active,
            shutdown,
            handle,
        }
    }

    /// Every command line received so far, across all connections
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until every accepted connection has been closed
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.active() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.active() == 0
    }

    /// Stop accepting and drop every open connection
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }

    /// Drop every open connection, leaving the handle usable for inspection
    pub fn kill(&self) {
        self.shutdown.cancel();
    }
}

async fn serve_connection(
    stream: TcpStream,
    behavior: StubBehavior,
    commands: Arc<Mutex<Vec<String>>>,
    shutdown: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    if let Some(banner) = &behavior.banner
        && writer.write_all(banner.as_bytes()).await.is_err()
    {
        return;
    }

    let mut lines = BufReader::new(reader).lines();
    let mut replies = 0;
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => return,
            },
        };
        commands.lock().unwrap().push(line);

        if behavior.reply {
            if writer.write_all(b"OK\n").await.is_err() {
                return;
            }
            replies += 1;
        }
        if behavior.close_after.is_some_and(|limit| replies >= limit) {
            return;
        }
    }
}

/// Session timings short enough for tests
pub fn fast_session() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_secs(2),
        settle_delay: Duration::ZERO,
        banner_timeout: Duration::from_millis(500),
        read_chunk_size: 4096,
    }
}

/// Fleet config pointed at `port` with no pacing and no stagger
pub fn fast_config(port: u16) -> FleetConfig {
    FleetConfig {
        host: "127.0.0.1".to_string(),
        port,
        client_count: 1,
        floor_count: 10,
        requests_per_client: 2,
        stagger: Duration::ZERO,
        seed: Some(7),
        session: fast_session(),
        pacing: PacingConfig::none(),
    }
}

/// A port with nothing listening on it
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// A listener that never accepts, with its backlog already filled
///
/// Further connects to `port` stall until the client gives up.
pub struct StalledListener {
    pub port: u16,
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

impl StalledListener {
    pub async fn start() -> Self {
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut queued = Vec::new();
        for _ in 0..8 {
            match tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => queued.push(stream),
                _ => break,
            }
        }

        Self {
            port: addr.port(),
            _listener: listener,
            _queued: queued,
        }
    }
}

/// Cancel `token` after `delay`
pub fn cancel_after(token: &CancellationToken, delay: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.cancel();
    });
}
