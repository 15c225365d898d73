//! Scenario execution
//!
//! One driver executes one scenario on a single control flow. Steps run
//! strictly in the order the author wrote them; send and expect against
//! the same handle are synchronous, while output of every other handle
//! keeps accumulating through its drain task in the background. Any step
//! failure aborts the scenario immediately.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;

use crate::common::config::HarnessConfig;
use crate::common::{Error, Result};
use crate::expect::Verdict;
use crate::process::{DrainStatus, ProcessHandle};

use super::config::{compile_expect, Scenario, Step};

/// Driver lifecycle; no transition leaves a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::NotStarted => "not started",
            DriverState::Running => "running",
            DriverState::Completed => "completed",
            DriverState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Executes a scenario's steps against the handles it spawns
///
/// The driver exclusively owns every handle it creates and terminates
/// them all, in reverse creation order, when the run ends or aborts.
pub struct ScenarioDriver {
    config: HarnessConfig,
    cwd: Option<PathBuf>,
    verbose: bool,
    handles: Vec<ProcessHandle>,
    index: HashMap<String, usize>,
    state: DriverState,
}

impl ScenarioDriver {
    /// Create a driver with an explicit configuration value
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            cwd: None,
            verbose: false,
            handles: Vec::new(),
            index: HashMap::new(),
            state: DriverState::NotStarted,
        }
    }

    /// Working directory for spawned processes
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Echo matched output while running
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Look up a handle by its scenario name
    pub fn handle(&self, process: &str) -> Result<&ProcessHandle> {
        self.index
            .get(process)
            .map(|&i| &self.handles[i])
            .ok_or_else(|| Error::UnknownProcess(process.to_string()))
    }

    fn handle_mut(&mut self, process: &str) -> Result<&mut ProcessHandle> {
        match self.index.get(process) {
            Some(&i) => Ok(&mut self.handles[i]),
            None => Err(Error::UnknownProcess(process.to_string())),
        }
    }

    /// Execute the scenario's steps strictly in order
    ///
    /// Produces the run's verdict exactly once. On the first failing step
    /// the driver terminates every handle it created, in reverse creation
    /// order, and surfaces the step index and cause.
    pub async fn run(&mut self, scenario: &Scenario) -> Result<Verdict> {
        if self.state != DriverState::NotStarted {
            return Err(Error::InvalidState {
                action: "run a scenario".to_string(),
                state: self.state.to_string(),
            });
        }
        self.state = DriverState::Running;
        tracing::info!(scenario = %scenario.name, steps = scenario.steps.len(), "running");

        for (i, step) in scenario.steps.iter().enumerate() {
            let step_num = i + 1;
            match self.execute(step).await {
                Ok(summary) => {
                    println!("  {} Step {}: {}", "✓".green(), step_num, summary.dimmed());
                }
                Err(e) => {
                    println!("  {} Step {}: {}", "✗".red(), step_num, e);
                    self.abort().await;
                    return Err(Error::step(step_num, e));
                }
            }
        }

        if let Err(e) = self.shutdown().await {
            self.state = DriverState::Aborted;
            return Err(e);
        }
        self.state = DriverState::Completed;
        Ok(Verdict::Success)
    }

    /// Terminate every handle, most recent first, and mark the run aborted
    pub async fn abort(&mut self) {
        let grace = self.grace();
        for handle in self.handles.iter_mut().rev() {
            if let Err(e) = handle.terminate(grace).await {
                tracing::warn!(process = handle.name(), error = %e, "termination failed");
            }
        }
        self.state = DriverState::Aborted;
    }

    /// Execute a single step, returning a short summary for step output
    async fn execute(&mut self, step: &Step) -> Result<String> {
        match step {
            Step::Spawn {
                process,
                program,
                args,
                env,
                launcher,
                detached,
            } => {
                if self.index.contains_key(process) {
                    return Err(Error::Scenario(format!(
                        "duplicate process name '{}'",
                        process
                    )));
                }
                let (program, args, env) =
                    self.resolve_launch(program.as_deref(), args, env, launcher.as_deref())?;
                let mut handle =
                    ProcessHandle::spawn(process, &program, &args, &env, self.cwd.as_deref())?;
                handle.set_detached(*detached);
                self.index.insert(process.clone(), self.handles.len());
                self.handles.push(handle);
                Ok(format!("spawn '{}' ({})", process, program.display()))
            }
            Step::Send { process, text } => {
                self.handle_mut(process)?.send_line(text).await?;
                Ok(format!("send {:?} to '{}'", text, process))
            }
            Step::Expect {
                process,
                pattern,
                literal,
                timeout,
            } => {
                let pattern = compile_expect(pattern.as_deref(), literal.as_deref(), *timeout)?;
                let default = Duration::from_secs(self.config.timeouts.expect_secs);
                let matched = self.handle(process)?.expect(&pattern, default).await?;
                if self.verbose {
                    println!("    {}", matched.text().trim_end().dimmed());
                }
                Ok(format!("expect `{}` on '{}'", pattern, process))
            }
            Step::WaitSuccess { process, timeout } => {
                let sentinel = self.config.sentinel.compile()?;
                let timeout =
                    Duration::from_secs(timeout.unwrap_or(self.config.timeouts.success_secs));
                match self.handle(process)?.wait_for_success(&sentinel, timeout).await {
                    Verdict::Success => Ok(format!("success sentinel on '{}'", process)),
                    Verdict::Failure(reason) => Err(Error::SuccessWait {
                        process: process.clone(),
                        reason,
                    }),
                }
            }
            Step::JoinDrain { process } => {
                match self.handle_mut(process)?.join_drain().await {
                    DrainStatus::Failed(message) => Err(Error::Drain {
                        process: process.clone(),
                        message,
                    }),
                    _ => Ok(format!("drain joined on '{}'", process)),
                }
            }
        }
    }

    /// Resolve a spawn step's program, arguments, and environment
    ///
    /// A launcher template contributes the program, leading arguments, and
    /// environment; the step's own program (if any) becomes the next
    /// argument and its env entries win over the launcher's.
    fn resolve_launch(
        &self,
        program: Option<&Path>,
        args: &[String],
        env: &HashMap<String, String>,
        launcher: Option<&str>,
    ) -> Result<(PathBuf, Vec<String>, HashMap<String, String>)> {
        let mut full_args = Vec::new();
        let mut full_env = HashMap::new();

        let program = match launcher {
            Some(name) => {
                let template = self.config.launcher(name)?;
                full_args.extend(template.args.iter().cloned());
                full_env.extend(template.env.clone());
                if let Some(p) = program {
                    full_args.push(p.to_string_lossy().into_owned());
                }
                template.program.clone()
            }
            None => program
                .ok_or_else(|| {
                    Error::Scenario("spawn step needs a program or a launcher".to_string())
                })?
                .to_path_buf(),
        };

        full_args.extend(args.iter().cloned());
        full_env.extend(env.clone());

        Ok((self.resolve_program(program), full_args, full_env))
    }

    /// Resolve a program path against the working directory and PATH
    fn resolve_program(&self, program: PathBuf) -> PathBuf {
        if program.components().count() > 1 {
            // An explicit path; make it relative to the workspace root
            match (&self.cwd, program.is_relative()) {
                (Some(cwd), true) => cwd.join(program),
                _ => program,
            }
        } else if program.exists() {
            program
        } else {
            // A bare name; prefer an explicit PATH lookup so a missing
            // program fails with the resolved name in the message
            which::which(&program).unwrap_or(program)
        }
    }

    /// Terminate every handle: non-detached first, then detached handles
    /// that were allowed to outlive them, each in reverse creation order
    ///
    /// A termination failure never skips the remaining handles; the first
    /// error is reported after every handle has been terminated.
    async fn shutdown(&mut self) -> Result<()> {
        let grace = self.grace();
        let order: Vec<usize> = (0..self.handles.len())
            .rev()
            .filter(|&i| !self.handles[i].detached())
            .chain(
                (0..self.handles.len())
                    .rev()
                    .filter(|&i| self.handles[i].detached()),
            )
            .collect();
        let mut first_error = None;
        for i in order {
            if let Err(e) = self.handles[i].terminate(grace).await {
                tracing::warn!(process = self.handles[i].name(), error = %e, "termination failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.config.timeouts.terminate_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_scenario() -> Scenario {
        Scenario {
            name: "empty".to_string(),
            description: None,
            steps: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_completed_driver_cannot_run_again() {
        let mut driver = ScenarioDriver::new(HarnessConfig::default());
        assert_eq!(driver.state(), DriverState::NotStarted);

        let verdict = driver.run(&empty_scenario()).await.unwrap();
        assert!(verdict.is_success());
        assert_eq!(driver.state(), DriverState::Completed);

        let err = driver.run(&empty_scenario()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(driver.state(), DriverState::Completed);
    }

    #[tokio::test]
    async fn test_step_against_unknown_process_fails_with_index() {
        let scenario = Scenario {
            name: "bad".to_string(),
            description: None,
            steps: vec![Step::Send {
                process: "ghost".to_string(),
                text: "u".to_string(),
            }],
        };
        let mut driver = ScenarioDriver::new(HarnessConfig::default());
        let err = driver.run(&scenario).await.unwrap_err();
        match err {
            Error::Step { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, Error::UnknownProcess(_)));
            }
            other => panic!("expected Step error, got {:?}", other),
        }
        assert_eq!(driver.state(), DriverState::Aborted);
    }

    fn spawn_sh(process: &str, script: &str, detached: bool) -> Step {
        Step::Spawn {
            process: process.to_string(),
            program: Some(PathBuf::from("sh")),
            args: vec!["-c".to_string(), script.to_string()],
            env: HashMap::new(),
            launcher: None,
            detached,
        }
    }

    #[tokio::test]
    async fn test_shutdown_terminates_every_handle() {
        let scenario = Scenario {
            name: "shutdown".to_string(),
            description: None,
            steps: vec![
                spawn_sh("worker", "read x", false),
                spawn_sh("router", "read x", true),
            ],
        };
        let mut driver = ScenarioDriver::new(HarnessConfig::default());
        let verdict = driver.run(&scenario).await.unwrap();
        assert!(verdict.is_success());
        assert_eq!(driver.state(), DriverState::Completed);

        // Both handles, the detached one included, were reaped
        assert!(driver.handle("worker").unwrap().exit_code().is_some());
        assert!(driver.handle("router").unwrap().exit_code().is_some());
    }

    #[tokio::test]
    async fn test_wait_success_failure_becomes_a_step_error() {
        let scenario = Scenario {
            name: "no sentinel".to_string(),
            description: None,
            steps: vec![
                spawn_sh("quick", "echo nope", false),
                Step::WaitSuccess {
                    process: "quick".to_string(),
                    timeout: Some(5),
                },
            ],
        };
        let mut driver = ScenarioDriver::new(HarnessConfig::default());
        let err = driver.run(&scenario).await.unwrap_err();
        match err {
            Error::Step { index, source } => {
                assert_eq!(index, 2);
                match *source {
                    Error::SuccessWait { process, reason } => {
                        assert_eq!(process, "quick");
                        assert!(reason.contains("exited"), "reason was: {}", reason);
                    }
                    other => panic!("expected SuccessWait, got {:?}", other),
                }
            }
            other => panic!("expected Step error, got {:?}", other),
        }
        assert_eq!(driver.state(), DriverState::Aborted);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_a_spawn_error() {
        let scenario = Scenario {
            name: "bad".to_string(),
            description: None,
            steps: vec![Step::Spawn {
                process: "p".to_string(),
                program: Some(PathBuf::from("/nonexistent/program/path")),
                args: Vec::new(),
                env: HashMap::new(),
                launcher: None,
                detached: false,
            }],
        };
        let mut driver = ScenarioDriver::new(HarnessConfig::default());
        let err = driver.run(&scenario).await.unwrap_err();
        match err {
            Error::Step { source, .. } => assert!(matches!(*source, Error::Spawn { .. })),
            other => panic!("expected Step error, got {:?}", other),
        }
    }
}
