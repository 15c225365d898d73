//! Scenario definition and execution

pub mod config;
pub mod driver;
pub mod runner;

pub use config::{Scenario, Step};
pub use driver::{DriverState, ScenarioDriver};
pub use runner::{check_file, run_file, RunResult};
