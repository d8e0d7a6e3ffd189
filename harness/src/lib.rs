//! Elevator Harness Library
//!
//! A concurrent load harness for a line-oriented elevator control server.
//! Each simulated client owns one TCP connection, a background receive task
//! and a seeded request generator; the fleet staggers their start-up and
//! reports what every client saw.

pub mod client;
pub mod config;
pub mod fleet;
pub mod scenario;

// Re-export commonly used types
pub use client::{ClientError, ClientIdentity, ClientSession, ConnectionState, SessionPhase};
pub use config::{ConfigError, FleetConfig, PacingConfig, SessionConfig};
pub use fleet::{ClientOutcome, FleetOrchestrator, FleetReport};
pub use scenario::{Command, RequestPlan, ScenarioDriver, ScenarioOutcome};
