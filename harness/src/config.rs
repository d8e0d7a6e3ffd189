//! Harness configuration
//!
//! Configuration is built from defaults, overlaid with environment variables
//! and finally with command-line flags in the binary. A `FleetConfig` is
//! immutable once a run starts.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors raised when a configuration cannot drive a run
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Floor count must be at least 2, got {0}")]
    InvalidFloorCount(u32),

    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("Invalid {name} range: {min:?} > {max:?}")]
    InvalidRange {
        name: &'static str,
        min: Duration,
        max: Duration,
    },

    #[error("Read chunk size must be non-zero")]
    InvalidChunkSize,
}

/// Main fleet configuration
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Elevator server host
    pub host: String,
    /// Elevator server port
    pub port: u16,
    /// Number of concurrent simulated clients
    pub client_count: usize,
    /// Number of floors served by the elevator system
    pub floor_count: u32,
    /// Request plans executed by each client
    pub requests_per_client: usize,
    /// Delay between successive client spawns
    pub stagger: Duration,
    /// Base seed for request generation; each client derives its own from it
    pub seed: Option<u64>,

    /// Per-session timing configuration
    pub session: SessionConfig,

    /// Scenario pacing configuration
    pub pacing: PacingConfig,
}

/// Session-related configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on establishing the TCP stream
    pub connect_timeout: Duration,
    /// Bound on waiting for a command's response
    pub response_timeout: Duration,
    /// Grace period before reading the welcome banner
    pub settle_delay: Duration,
    /// Bound on waiting for the welcome banner
    pub banner_timeout: Duration,
    /// Maximum bytes taken from the stream per read
    pub read_chunk_size: usize,
}

/// Human-scale delays between scenario steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// Pause after the status query
    pub status_pause: Duration,
    /// Simulated elevator transit before the rider selects a destination
    pub transit_delay: DelayRange,
    /// Pause before the next request plan
    pub between_requests: DelayRange,
}

/// Inclusive range a random delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// A range that always yields the same delay
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            client_count: 5,
            floor_count: 15,
            requests_per_client: 8,
            stagger: Duration::from_millis(1500),
            seed: None,
            session: SessionConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            banner_timeout: Duration::from_secs(10),
            read_chunk_size: 4096,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            status_pause: Duration::from_secs(1),
            transit_delay: DelayRange::new(Duration::from_millis(500), Duration::from_millis(1500)),
            between_requests: DelayRange::new(Duration::from_secs(1), Duration::from_secs(3)),
        }
    }
}

impl PacingConfig {
    /// No pauses at all; used to drive scenarios as fast as the server answers
    pub fn none() -> Self {
        Self {
            status_pause: Duration::ZERO,
            transit_delay: DelayRange::fixed(Duration::ZERO),
            between_requests: DelayRange::fixed(Duration::ZERO),
        }
    }
}

impl FleetConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Overlay values produced by `lookup` onto the defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server
        if let Some(host) = lookup("ELEVATOR_HOST")
            && !host.is_empty()
        {
            config.host = host;
        }
        if let Some(val) = lookup("ELEVATOR_PORT")
            && let Ok(port) = val.parse()
        {
            config.port = port;
        }

        // Fleet
        if let Some(val) = lookup("FLEET_CLIENTS")
            && let Ok(n) = val.parse()
        {
            config.client_count = n;
        }
        if let Some(val) = lookup("FLEET_FLOORS")
            && let Ok(n) = val.parse()
        {
            config.floor_count = n;
        }
        if let Some(val) = lookup("FLEET_REQUESTS")
            && let Ok(n) = val.parse()
        {
            config.requests_per_client = n;
        }
        if let Some(val) = lookup("FLEET_STAGGER_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.stagger = Duration::from_millis(ms);
        }
        if let Some(val) = lookup("FLEET_SEED")
            && let Ok(seed) = val.parse()
        {
            config.seed = Some(seed);
        }

        // Session
        if let Some(val) = lookup("RESPONSE_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.session.response_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("CONNECT_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.session.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("SETTLE_DELAY_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.session.settle_delay = Duration::from_millis(ms);
        }

        config
    }

    /// Check that the configuration can drive a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor_count < 2 {
            return Err(ConfigError::InvalidFloorCount(self.floor_count));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.session.read_chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        self.pacing.transit_delay.validate("transit delay")?;
        self.pacing.between_requests.validate("between-requests delay")?;
        Ok(())
    }

    /// Address string used for connecting and for log lines
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
