//! Scripted rider scenarios
//!
//! A scenario repeats `status`, `call <origin> <direction>` and
//! `go <destination>` for a configured number of randomly generated trips.

pub mod command;
pub mod driver;
pub mod plan;

pub use command::{Command, CommandParseError, Direction};
pub use driver::{ScenarioDriver, ScenarioOutcome, ScenarioRun};
pub use plan::RequestPlan;
