use clap::Parser;
use elevator_harness::{FleetConfig, FleetOrchestrator};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Concurrent client load harness for a line-oriented elevator server.
///
/// Flags override the corresponding environment variables, which override
/// the built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "elevator-harness")]
#[command(version, about)]
struct Args {
    /// Elevator server host.
    #[arg(long)]
    server: Option<String>,

    /// Elevator server port.
    #[arg(long)]
    port: Option<u16>,

    /// Number of concurrent simulated clients.
    #[arg(long)]
    clients: Option<usize>,

    /// Number of floors served by the elevator system (at least 2).
    #[arg(long)]
    floors: Option<u32>,

    /// Request plans executed by each client.
    #[arg(long)]
    requests: Option<usize>,

    /// Milliseconds between successive client spawns.
    #[arg(long)]
    stagger_ms: Option<u64>,

    /// Base seed for reproducible request generation.
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds to wait for each command's response.
    #[arg(long)]
    response_timeout_secs: Option<u64>,

    /// Print the fleet report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(self, mut config: FleetConfig) -> FleetConfig {
        if let Some(host) = self.server {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(n) = self.clients {
            config.client_count = n;
        }
        if let Some(n) = self.floors {
            config.floor_count = n;
        }
        if let Some(n) = self.requests {
            config.requests_per_client = n;
        }
        if let Some(ms) = self.stagger_ms {
            config.stagger = Duration::from_millis(ms);
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(secs) = self.response_timeout_secs {
            config.session.response_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elevator_harness=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let json = args.json;
    let config = args.apply(FleetConfig::from_env());
    info!(
        "Loaded configuration: server={}, clients={}, floors={}, requests={}",
        config.server_addr(),
        config.client_count,
        config.floor_count,
        config.requests_per_client
    );

    let fleet = FleetOrchestrator::new(config)?;

    // Ctrl-C stops spawning and disconnects every running client
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, disconnecting all clients");
                ctrl_c.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let report = fleet.run(cancel).await;
    report.print_summary();

    if json {
        println!("{}", report.to_json()?);
    }

    Ok(())
}
