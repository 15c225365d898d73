//! One spawned child process: its input stream, its buffered output, and
//! its termination state

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin, Command};

use crate::common::Result;
use crate::expect::{self, MatchOutput, Pattern, Verdict};

use super::buffer::OutputBuffer;
use super::drain::{DrainStatus, DrainTask};

/// Owns a live child process plus its buffered output state
///
/// Writes go through a buffered stdin pipe; reads come out of the shared
/// output buffer that the handle's drain task keeps filled. stderr is
/// inherited so diagnostics from the child land on the harness's own
/// stderr instead of being matched against.
pub struct ProcessHandle {
    name: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    output: Arc<OutputBuffer>,
    drain: DrainTask,
    detached: bool,
    exit_code: Option<i32>,
}

impl ProcessHandle {
    /// Spawn a child process and begin draining its output
    pub fn spawn(
        name: &str,
        program: &Path,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let program_display = program.display().to_string();
        let mut child = cmd
            .spawn()
            .map_err(|e| crate::common::Error::spawn(&program_display, e))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            crate::common::Error::spawn(&program_display, io::Error::other("stdin not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            crate::common::Error::spawn(&program_display, io::Error::other("stdout not captured"))
        })?;

        let output = Arc::new(OutputBuffer::new());
        let drain = DrainTask::new(name, stdout, Arc::clone(&output));

        tracing::debug!(process = name, pid = ?child.id(), program = %program_display, "spawned");

        Ok(Self {
            name: name.to_string(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            output,
            drain,
            detached: false,
            exit_code: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, while the child is running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The shared output buffer this handle's drain task fills
    pub fn output(&self) -> &Arc<OutputBuffer> {
        &self.output
    }

    /// Mark the handle as outliving the normal end-of-run termination set
    pub fn set_detached(&mut self, detached: bool) {
        self.detached = detached;
    }

    pub fn detached(&self) -> bool {
        self.detached
    }

    /// Write `text` plus a newline to the child's stdin
    ///
    /// Non-blocking aside from OS-level backpressure on the input pipe.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            crate::common::Error::write(
                &self.name,
                io::Error::new(io::ErrorKind::BrokenPipe, "stdin already closed"),
            )
        })?;

        let write = async {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        write
            .await
            .map_err(|e| crate::common::Error::write(&self.name, e))?;

        tracing::debug!(process = %self.name, text, "sent line");
        Ok(())
    }

    /// Block until `pattern` matches unconsumed output, or `timeout` elapses
    pub async fn expect(&self, pattern: &Pattern, timeout: Duration) -> Result<MatchOutput> {
        expect::expect(self, pattern, timeout).await
    }

    /// Wait for `sentinel` and fold the outcome into a verdict
    pub async fn wait_for_success(&self, sentinel: &Pattern, timeout: Duration) -> Verdict {
        expect::wait_for_success(self, sentinel, timeout).await
    }

    /// Close the child's input stream, signal it to exit, and reap it
    ///
    /// Idempotent. Gives the child `grace` to exit after stdin closes (and,
    /// on Unix, after SIGTERM) before killing it outright.
    pub async fn terminate(&mut self, grace: Duration) -> Result<Option<i32>> {
        if let Some(code) = self.exit_code {
            return Ok(Some(code));
        }

        // Closing stdin is the polite exit signal for line-driven services
        self.stdin.take();

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }

        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::debug!(process = %self.name, "grace period expired, killing");
                self.child.kill().await?;
                self.child.wait().await?
            }
        };

        // Let the drain observe end-of-stream so the buffer reports eof
        self.drain.join().await;

        let code = status.code();
        self.exit_code = code;
        tracing::debug!(process = %self.name, ?code, "terminated");
        Ok(code)
    }

    /// Exit code, if the child has been reaped
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Wait for the drain task to finish and report its recorded status
    pub async fn join_drain(&mut self) -> DrainStatus {
        self.drain.join().await
    }

    /// Recorded drain status without waiting
    pub fn drain_status(&self) -> DrainStatus {
        self.drain.status()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Best-effort: never leave an orphaned child behind
        if self.exit_code.is_none() {
            let _ = self.child.start_kill();
        }
    }
}
