//! Spawns the client fleet and collects its results

use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use super::report::{ClientOutcome, ClientReport, FleetReport};
use crate::client::{ClientError, ClientIdentity, ClientSession};
use crate::config::{ConfigError, FleetConfig};
use crate::scenario::ScenarioDriver;

/// Runs `client_count` independent sessions against one server
///
/// Clients are spawned one `stagger` apart. Each owns its own connection,
/// receive task and request generator, so a failing client never affects
/// the others.
#[derive(Debug, Clone)]
pub struct FleetOrchestrator {
    config: Arc<FleetConfig>,
}

impl FleetOrchestrator {
    pub fn new(config: FleetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Seed for one client's request generator
    fn seed_for(&self, id: usize) -> u64 {
        match self.config.seed {
            Some(base) => base.wrapping_add(id as u64),
            None => rand::rng().random(),
        }
    }

    /// Spawn every client, then wait for all of them to finish
    ///
    /// Cancelling `cancel` stops further spawns and tells every running
    /// session to disconnect; the call still returns a full report.
    pub async fn run(&self, cancel: CancellationToken) -> FleetReport {
        let started = Instant::now();
        let mut tasks = JoinSet::new();
        let mut report = FleetReport::new();

        info!(
            "Starting {} clients against {} ({} floors, {} requests each)",
            self.config.client_count,
            self.config.server_addr(),
            self.config.floor_count,
            self.config.requests_per_client
        );

        for id in 0..self.config.client_count {
            if id > 0 && !self.config.stagger.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.stagger) => {}
                }
            }
            if cancel.is_cancelled() {
                warn!(
                    "Cancelled after spawning {} of {} clients",
                    id, self.config.client_count
                );
                break;
            }

            let identity = ClientIdentity::new(id);
            let seed = self.seed_for(id);
            let driver = match ScenarioDriver::from_config(&self.config, seed) {
                Ok(driver) => driver,
                Err(e) => {
                    error!("Cannot build scenario for {}: {}", identity, e);
                    report.failed_tasks += 1;
                    continue;
                }
            };

            let span = info_span!("client", id = identity.id, label = identity.label);
            let task = run_client(
                self.config.clone(),
                identity,
                driver,
                cancel.clone(),
                started,
            );
            tasks.spawn(task.instrument(span));
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(client) => report.clients.push(client),
                Err(e) => {
                    error!("Client task failed: {}", e);
                    report.failed_tasks += 1;
                }
            }
        }

        report.clients.sort_by_key(|c| c.identity.id);
        report.cancelled = cancel.is_cancelled();
        report.duration = started.elapsed();
        info!("All clients have finished");
        report
    }
}

/// Full lifecycle of one client: connect, run its scenario, disconnect
async fn run_client(
    config: Arc<FleetConfig>,
    identity: ClientIdentity,
    mut driver: ScenarioDriver,
    cancel: CancellationToken,
    fleet_started: Instant,
) -> ClientReport {
    let spawned_at = fleet_started.elapsed();
    let seed = driver.seed();
    info!("Starting with seed {}", seed);

    let mut session = ClientSession::new(
        identity.clone(),
        config.host.clone(),
        config.port,
        config.session.clone(),
    )
    .with_parent_token(&cancel);

    let finish = |session: &ClientSession, outcome: ClientOutcome, plans: usize| ClientReport {
        identity: identity.clone(),
        seed,
        outcome,
        stats: session.stats(),
        plans_completed: plans,
        spawned_at,
        finished_at: fleet_started.elapsed(),
    };

    if let Err(e) = session.connect().await {
        session.disconnect().await;
        let outcome = match e {
            ClientError::Cancelled => ClientOutcome::Cancelled,
            other => ClientOutcome::ConnectFailed {
                reason: other.to_string(),
            },
        };
        return finish(&session, outcome, 0);
    }
    info!("Connected to {}", config.server_addr());

    let run = driver.run(&mut session).await;
    session.disconnect().await;

    finish(&session, run.outcome.into(), run.plans.len())
}
