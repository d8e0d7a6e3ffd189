//! Concurrent client fleet
//!
//! The orchestrator staggers client start-up, isolates each client in its
//! own task, and folds the per-client results into a `FleetReport`.

pub mod orchestrator;
pub mod report;

pub use orchestrator::FleetOrchestrator;
pub use report::{ClientOutcome, ClientReport, FleetReport};
