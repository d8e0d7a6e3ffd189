//! Drives one session through its scripted rider requests

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::command::Command;
use super::plan::RequestPlan;
use crate::client::ClientSession;
use crate::config::{ConfigError, DelayRange, FleetConfig, PacingConfig};

/// How a scenario ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// Every request plan was attempted
    Completed,
    /// The connection went away mid-scenario
    Disconnected,
    /// The run was stopped from outside
    Cancelled,
}

/// Result of one `ScenarioDriver::run`
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub outcome: ScenarioOutcome,
    /// Plans whose `go` command was attempted
    pub plans: Vec<RequestPlan>,
}

/// Generates request plans from its own seeded generator and issues them
/// with human-scale pauses
#[derive(Debug)]
pub struct ScenarioDriver {
    rng: ChaCha8Rng,
    seed: u64,
    floor_count: u32,
    requests: usize,
    pacing: PacingConfig,
}

impl ScenarioDriver {
    pub fn new(
        seed: u64,
        floor_count: u32,
        requests: usize,
        pacing: PacingConfig,
    ) -> Result<Self, ConfigError> {
        if floor_count < 2 {
            return Err(ConfigError::InvalidFloorCount(floor_count));
        }
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            floor_count,
            requests,
            pacing,
        })
    }

    pub fn from_config(config: &FleetConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::new(
            seed,
            config.floor_count,
            config.requests_per_client,
            config.pacing.clone(),
        )
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next rider trip from this driver's generator
    pub fn next_plan(&mut self) -> RequestPlan {
        // floor_count was validated in new()
        loop {
            if let Ok(plan) = RequestPlan::generate(&mut self.rng, self.floor_count) {
                return plan;
            }
        }
    }

    fn pick_delay(&mut self, range: DelayRange) -> Duration {
        if range.min >= range.max {
            return range.min;
        }
        let min = range.min.as_millis() as u64;
        let max = range.max.as_millis() as u64;
        Duration::from_millis(self.rng.random_range(min..=max))
    }

    /// Run every request plan against `session`
    ///
    /// Each iteration issues `status`, `call <origin> <direction>` and
    /// `go <destination>`, waiting for each response before the next command.
    /// Missing responses do not stop the scenario; a lost connection does.
    pub async fn run(&mut self, session: &mut ClientSession) -> ScenarioRun {
        let cancel = session.cancel_token().clone();
        let response_timeout = session.config().response_timeout;
        let mut plans = Vec::with_capacity(self.requests);

        let outcome = 'scenario: {
            for i in 0..self.requests {
                if cancel.is_cancelled() {
                    break 'scenario ScenarioOutcome::Cancelled;
                }
                if !session.is_connected() {
                    break 'scenario ScenarioOutcome::Disconnected;
                }
                debug!("Request {}/{}", i + 1, self.requests);

                issue(session, Command::Status, response_timeout).await;
                if !pause(&cancel, self.pacing.status_pause).await {
                    break 'scenario ScenarioOutcome::Cancelled;
                }
                if !session.is_connected() {
                    break 'scenario ScenarioOutcome::Disconnected;
                }

                let plan = self.next_plan();
                debug!(
                    origin = plan.origin(),
                    destination = plan.destination(),
                    direction = %plan.direction(),
                    "Generated request"
                );
                issue(session, plan.call_command(), response_timeout).await;

                let transit = self.pick_delay(self.pacing.transit_delay);
                if !pause(&cancel, transit).await {
                    break 'scenario ScenarioOutcome::Cancelled;
                }
                if !session.is_connected() {
                    break 'scenario ScenarioOutcome::Disconnected;
                }

                issue(session, plan.go_command(), response_timeout).await;
                plans.push(plan);

                let wait = self.pick_delay(self.pacing.between_requests);
                if i + 1 < self.requests && !pause(&cancel, wait).await {
                    break 'scenario ScenarioOutcome::Cancelled;
                }
            }
            ScenarioOutcome::Completed
        };

        match outcome {
            ScenarioOutcome::Completed => {
                info!("Scenario complete after {} requests", plans.len())
            }
            ScenarioOutcome::Disconnected => info!(
                "Connection lost, ending scenario early after {} of {} requests",
                plans.len(),
                self.requests
            ),
            ScenarioOutcome::Cancelled => info!("Scenario cancelled"),
        }

        ScenarioRun { outcome, plans }
    }
}

async fn issue(session: &mut ClientSession, command: Command, timeout: Duration) {
    if session.send_command(&command.to_line()).await {
        session.await_response(timeout).await;
    }
}

/// Sleep for `delay`; `false` if cancelled first
async fn pause(cancel: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
