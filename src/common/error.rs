//! Error types for the harness
//!
//! Every failure a scenario can hit is fail-fast: the driver stops at the
//! first failing step and reports the step index, the awaited pattern, and
//! whatever output was buffered at that point.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Process Errors ===
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("input stream of '{process}' is closed: {source}")]
    Write {
        process: String,
        #[source]
        source: io::Error,
    },

    #[error("no process named '{0}' in this scenario")]
    UnknownProcess(String),

    // === Expectation Errors ===
    #[error(
        "timed out after {secs}s waiting for `{pattern}` on '{process}'; buffered output:\n{buffered}"
    )]
    ExpectTimeout {
        process: String,
        pattern: String,
        secs: u64,
        buffered: String,
    },

    #[error("'{process}' exited before matching `{pattern}`; buffered output:\n{buffered}")]
    UnexpectedExit {
        process: String,
        pattern: String,
        buffered: String,
    },

    #[error("'{process}' did not reach success: {reason}")]
    SuccessWait { process: String, reason: String },

    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // === Drain Errors ===
    #[error("drain task for '{process}' recorded a failure: {message}")]
    Drain { process: String, message: String },

    // === Scenario Errors ===
    #[error("invalid scenario: {0}")]
    Scenario(String),

    #[error("step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("cannot {action}: scenario driver is {state}")]
    InvalidState { action: String, state: String },

    // === Configuration Errors ===
    #[error("configuration error: {message} (searched: {searched:?})")]
    Configuration {
        message: String,
        searched: Vec<String>,
    },

    #[error("invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a configuration error carrying the searched paths
    pub fn configuration<S: AsRef<str>>(message: &str, searched: &[S]) -> Self {
        Self::Configuration {
            message: message.to_string(),
            searched: searched.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Wrap an error with the 1-based index of the scenario step that raised it
    pub fn step(index: usize, source: Error) -> Self {
        Self::Step {
            index,
            source: Box::new(source),
        }
    }

    /// Create a spawn error for a program that could not be launched
    pub fn spawn(program: &str, source: io::Error) -> Self {
        Self::Spawn {
            program: program.to_string(),
            source,
        }
    }

    /// Create a write error for a closed input stream
    pub fn write(process: &str, source: io::Error) -> Self {
        Self::Write {
            process: process.to_string(),
            source,
        }
    }
}
