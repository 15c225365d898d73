//! Expect-style process orchestration for end-to-end tests
//!
//! The harness spawns the processes a test needs, keeps their output
//! flowing into in-memory buffers through background drain tasks, and
//! lets a scenario interleave stdin writes with blocking pattern
//! expectations until a success sentinel (or a failure) decides the run.

pub mod common;
pub mod expect;
pub mod process;
pub mod scenario;

pub use common::{Error, Result};
pub use expect::{wait_for_success, MatchOutput, Pattern, Verdict};
pub use process::{DrainStatus, ProcessHandle};
pub use scenario::{Scenario, ScenarioDriver, Step};
