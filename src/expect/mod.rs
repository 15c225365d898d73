//! Pattern matching and success detection over process output

pub mod matcher;
pub mod pattern;
pub mod success;

pub use matcher::expect;
pub use pattern::{MatchOutput, Pattern};
pub use success::{wait_for_success, Verdict};
