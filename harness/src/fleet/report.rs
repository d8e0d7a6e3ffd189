//! Per-client and fleet-wide results

use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::client::{ClientIdentity, LatencyStats, LatencySummary, SessionStats};
use crate::scenario::ScenarioOutcome;

/// Terminal state of one client task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientOutcome {
    Completed,
    Disconnected,
    Cancelled,
    ConnectFailed { reason: String },
}

impl From<ScenarioOutcome> for ClientOutcome {
    fn from(outcome: ScenarioOutcome) -> Self {
        match outcome {
            ScenarioOutcome::Completed => ClientOutcome::Completed,
            ScenarioOutcome::Disconnected => ClientOutcome::Disconnected,
            ScenarioOutcome::Cancelled => ClientOutcome::Cancelled,
        }
    }
}

/// What one client did, with timings relative to the fleet start
#[derive(Debug, Clone)]
pub struct ClientReport {
    pub identity: ClientIdentity,
    pub seed: u64,
    pub outcome: ClientOutcome,
    pub stats: SessionStats,
    /// Request plans whose final command was attempted
    pub plans_completed: usize,
    pub spawned_at: Duration,
    pub finished_at: Duration,
}

/// Aggregated results of a fleet run
#[derive(Debug, Default)]
pub struct FleetReport {
    /// Client reports ordered by client id
    pub clients: Vec<ClientReport>,
    /// Client tasks that panicked or were aborted
    pub failed_tasks: usize,
    /// Whether the run was cancelled from outside
    pub cancelled: bool,
    pub duration: Duration,
}

impl FleetReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn count(&self, pred: impl Fn(&ClientOutcome) -> bool) -> usize {
        self.clients.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| *o == ClientOutcome::Completed)
    }

    pub fn disconnected(&self) -> usize {
        self.count(|o| *o == ClientOutcome::Disconnected)
    }

    pub fn cancelled_clients(&self) -> usize {
        self.count(|o| *o == ClientOutcome::Cancelled)
    }

    pub fn connect_failures(&self) -> usize {
        self.count(|o| matches!(o, ClientOutcome::ConnectFailed { .. }))
    }

    pub fn commands_sent(&self) -> u64 {
        self.clients.iter().map(|c| c.stats.commands_sent).sum()
    }

    pub fn responses_received(&self) -> u64 {
        self.clients.iter().map(|c| c.stats.responses_received).sum()
    }

    pub fn response_timeouts(&self) -> u64 {
        self.clients.iter().map(|c| c.stats.response_timeouts).sum()
    }

    /// Round-trip latencies across every client
    pub fn latencies(&self) -> LatencyStats {
        let mut all = LatencyStats::new();
        for client in &self.clients {
            all.merge(&client.stats.latencies);
        }
        all
    }

    /// Elapsed time between the first and the last client spawn
    pub fn spawn_span(&self) -> Duration {
        let offsets = self.clients.iter().map(|c| c.spawned_at);
        match (offsets.clone().min(), offsets.max()) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::ZERO,
        }
    }

    /// Fraction of sent commands that never got a response in time
    pub fn timeout_rate(&self) -> f64 {
        let sent = self.commands_sent();
        if sent > 0 {
            self.response_timeouts() as f64 / sent as f64
        } else {
            0.0
        }
    }

    /// Log a human-readable summary
    pub fn print_summary(&self) {
        let latencies = self.latencies();
        let ms = |d: Option<Duration>| {
            d.map(|d| format!("{:.1}ms", d.as_secs_f64() * 1000.0))
                .unwrap_or_else(|| "n/a".to_string())
        };

        info!(
            "Fleet finished in {:.1}s{}",
            self.duration.as_secs_f64(),
            if self.cancelled { " (cancelled)" } else { "" }
        );
        info!(
            "Clients: {} completed, {} disconnected early, {} cancelled, {} failed to connect, {} crashed",
            self.completed(),
            self.disconnected(),
            self.cancelled_clients(),
            self.connect_failures(),
            self.failed_tasks
        );
        info!(
            "Commands: {} sent, {} answered, {} timed out ({:.1}%)",
            self.commands_sent(),
            self.responses_received(),
            self.response_timeouts(),
            self.timeout_rate() * 100.0
        );
        info!(
            "Round-trip: p50 {}, p99 {}, max {}",
            ms(latencies.p50()),
            ms(latencies.p99()),
            ms(latencies.max())
        );
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&FleetSummary::from(self))
    }
}

#[derive(Debug, Serialize)]
struct ClientSummary<'a> {
    id: usize,
    label: &'static str,
    seed: u64,
    outcome: &'a ClientOutcome,
    commands_sent: u64,
    responses_received: u64,
    response_timeouts: u64,
    reads: u64,
    banner_received: bool,
    plans_completed: usize,
    spawned_at_ms: u128,
    finished_at_ms: u128,
    latency: LatencySummary,
}

#[derive(Debug, Serialize)]
struct FleetSummary<'a> {
    duration_secs: f64,
    cancelled: bool,
    completed: usize,
    disconnected: usize,
    cancelled_clients: usize,
    connect_failures: usize,
    failed_tasks: usize,
    commands_sent: u64,
    responses_received: u64,
    response_timeouts: u64,
    latency: LatencySummary,
    clients: Vec<ClientSummary<'a>>,
}

impl<'a> From<&'a FleetReport> for FleetSummary<'a> {
    fn from(report: &'a FleetReport) -> Self {
        Self {
            duration_secs: report.duration.as_secs_f64(),
            cancelled: report.cancelled,
            completed: report.completed(),
            disconnected: report.disconnected(),
            cancelled_clients: report.cancelled_clients(),
            connect_failures: report.connect_failures(),
            failed_tasks: report.failed_tasks,
            commands_sent: report.commands_sent(),
            responses_received: report.responses_received(),
            response_timeouts: report.response_timeouts(),
            latency: report.latencies().summary(),
            clients: report
                .clients
                .iter()
                .map(|c| ClientSummary {
                    id: c.identity.id,
                    label: c.identity.label,
                    seed: c.seed,
                    outcome: &c.outcome,
                    commands_sent: c.stats.commands_sent,
                    responses_received: c.stats.responses_received,
                    response_timeouts: c.stats.response_timeouts,
                    reads: c.stats.reads,
                    banner_received: c.stats.banner_received,
                    plans_completed: c.plans_completed,
                    spawned_at_ms: c.spawned_at.as_millis(),
                    finished_at_ms: c.finished_at.as_millis(),
                    latency: c.stats.latencies.summary(),
                })
                .collect(),
        }
    }
}
