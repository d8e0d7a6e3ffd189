//! Simulated elevator client: connection, response channel and session

pub mod channel;
pub mod connection;
pub mod receiver;
pub mod session;
pub mod state;
pub mod stats;
pub mod types;

pub use channel::{ResponseQueue, ResponseSink, response_channel};
pub use connection::Connection;
pub use session::{ClientSession, SessionPhase};
pub use state::{ConnectionState, StateHandle};
pub use stats::{LatencyStats, LatencySummary, SessionStats};
pub use types::{ClientError, ClientIdentity, ResponseMessage};
