//! Blocking expectation against a growing output buffer
//!
//! Patterns are tried incrementally as bytes arrive, so a "ready" line is
//! reacted to the moment it is emitted rather than when the process ends.

use std::time::Duration;

use tokio::time::Instant;

use crate::common::{Error, Result};
use crate::process::ProcessHandle;

use super::{MatchOutput, Pattern};

/// How much unmatched buffer tail to carry in failure diagnostics
const DIAGNOSTIC_TAIL_BYTES: usize = 4096;

/// Block until `pattern` matches a contiguous, previously-unconsumed
/// region of the handle's output buffer, or until the timeout elapses
///
/// On a match the consumed cursor advances past the match and the matched
/// text (with any capture groups) is returned. On timeout the buffer and
/// cursor are left untouched so the caller may retry or abort, and the
/// error carries the unmatched tail for diagnostics. A pattern-level
/// timeout, when set, overrides `default_timeout`.
pub async fn expect(
    handle: &ProcessHandle,
    pattern: &Pattern,
    default_timeout: Duration,
) -> Result<MatchOutput> {
    let timeout = pattern.timeout().unwrap_or(default_timeout);
    let deadline = Instant::now() + timeout;
    let buffer = handle.output();

    loop {
        // Register for wakeups before scanning; an append racing with the
        // scan then still wakes us.
        let changed = buffer.changed();

        let scan = buffer.scan(pattern);
        if let Some(matched) = scan.matched {
            tracing::debug!(
                process = handle.name(),
                pattern = pattern.as_str(),
                "matched"
            );
            return Ok(matched);
        }
        if scan.eof {
            return Err(Error::UnexpectedExit {
                process: handle.name().to_string(),
                pattern: pattern.as_str().to_string(),
                buffered: buffer.unconsumed_lossy(DIAGNOSTIC_TAIL_BYTES),
            });
        }

        if tokio::time::timeout_at(deadline, changed).await.is_err() {
            return Err(Error::ExpectTimeout {
                process: handle.name().to_string(),
                pattern: pattern.as_str().to_string(),
                secs: timeout.as_secs(),
                buffered: buffer.unconsumed_lossy(DIAGNOSTIC_TAIL_BYTES),
            });
        }
    }
}
