//! Terminal success detection
//!
//! A scenario declares a process successful when a designated sentinel
//! pattern appears in its stream. Repeat invocations against one
//! long-lived handle each search only forward of the previous consumed
//! cursor, so a single sentinel is never counted twice.

use std::fmt;
use std::time::Duration;

use crate::process::ProcessHandle;

use super::{matcher, Pattern};

/// Terminal outcome of a scenario run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure(String),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    /// Process exit code for this verdict: 0 on success, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Failure(_) => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => f.write_str("success"),
            Verdict::Failure(reason) => write!(f, "failure: {}", reason),
        }
    }
}

/// Wait for the sentinel on `handle` and fold the outcome into a verdict
///
/// Resolves to `Failure` when the timeout elapses or the process exits
/// before emitting the sentinel; it never hangs past the timeout.
pub async fn wait_for_success(
    handle: &ProcessHandle,
    sentinel: &Pattern,
    timeout: Duration,
) -> Verdict {
    match matcher::expect(handle, sentinel, timeout).await {
        Ok(_) => Verdict::Success,
        Err(e) => Verdict::Failure(e.to_string()),
    }
}
