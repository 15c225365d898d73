//! Background output draining
//!
//! Each handle gets one drain task that keeps reading the child's stdout
//! and appending into the shared buffer, whether or not anyone is
//! currently expecting on that handle. Without it, a process the driver
//! is not actively talking to can fill its output pipe and block, which
//! deadlocks the scenario.

use std::sync::{Arc, Mutex};

use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;

use super::buffer::OutputBuffer;

const CHUNK_SIZE: usize = 8192;

/// Terminal state recorded by a drain task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainStatus {
    /// Task is still reading
    Running,
    /// Stream ended normally (process closed stdout or exited)
    Clean,
    /// The underlying read failed; recorded, never raised
    Failed(String),
}

/// A background task bound to one handle's output stream
///
/// `start`/`stop` are idempotent; stopping after the bound process has
/// exited is safe. The task never outlives the handle that owns it.
#[derive(Debug)]
pub struct DrainTask {
    process: String,
    task: Option<JoinHandle<()>>,
    status: Arc<Mutex<DrainStatus>>,
}

impl DrainTask {
    /// Create a drain task for `stdout` and start reading immediately
    pub fn new(process: &str, stdout: ChildStdout, buffer: Arc<OutputBuffer>) -> Self {
        let mut task = Self {
            process: process.to_string(),
            task: None,
            status: Arc::new(Mutex::new(DrainStatus::Running)),
        };
        task.start(stdout, buffer);
        task
    }

    fn start(&mut self, mut stdout: ChildStdout, buffer: Arc<OutputBuffer>) {
        if self.task.is_some() {
            return;
        }
        let status = Arc::clone(&self.status);
        let process = self.process.clone();
        self.task = Some(tokio::spawn(async move {
            let mut chunk = [0u8; CHUNK_SIZE];
            loop {
                match stdout.read(&mut chunk).await {
                    Ok(0) => {
                        tracing::debug!(process = %process, "output stream ended");
                        *status.lock().expect("drain status poisoned") = DrainStatus::Clean;
                        break;
                    }
                    Ok(n) => buffer.append(&chunk[..n]),
                    Err(e) => {
                        // Recorded for later inspection, never raised here
                        tracing::debug!(process = %process, error = %e, "output read failed");
                        *status.lock().expect("drain status poisoned") =
                            DrainStatus::Failed(e.to_string());
                        break;
                    }
                }
            }
            buffer.mark_eof();
        }));
    }

    /// Stop reading immediately; idempotent, safe after process exit
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Wait for the task to observe end-of-stream, then report its status
    pub async fn join(&mut self) -> DrainStatus {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.status()
    }

    /// The recorded status
    pub fn status(&self) -> DrainStatus {
        self.status.lock().expect("drain status poisoned").clone()
    }
}

impl Drop for DrainTask {
    fn drop(&mut self) {
        self.stop();
    }
}
