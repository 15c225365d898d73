//! Running scenario files from the command line

use std::path::Path;
use std::time::Instant;

use colored::Colorize;

use crate::common::config::HarnessConfig;
use crate::common::{Error, Result};

use super::config::Scenario;
use super::driver::ScenarioDriver;

/// Outcome of one scenario file
pub struct RunResult {
    pub name: String,
    pub passed: bool,
    pub duration_secs: f64,
    pub error: Option<String>,
}

impl RunResult {
    /// Process exit code for this result: 0 on pass, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.passed {
            0
        } else {
            1
        }
    }
}

/// Load, validate, and execute a scenario file
pub async fn run_file(path: &Path, config: &HarnessConfig, verbose: bool) -> Result<RunResult> {
    let scenario = Scenario::load(path)?;
    scenario
        .validate(config)
        .map_err(|e| Error::Scenario(format!("{}: {}", path.display(), e)))?;

    println!("{} {}", "Running:".bold(), scenario.name);
    if let Some(description) = &scenario.description {
        println!("  {}", description.dimmed());
    }

    let cwd = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf());

    let mut driver = ScenarioDriver::new(config.clone()).with_verbose(verbose);
    if let Some(root) = config.workspace.resolve(cwd.as_deref().unwrap_or(Path::new(".")))? {
        driver = driver.with_cwd(root);
    } else if let Some(cwd) = cwd {
        driver = driver.with_cwd(cwd);
    }

    let start = Instant::now();
    let outcome = driver.run(&scenario).await;
    let duration_secs = start.elapsed().as_secs_f64();

    match outcome {
        Ok(verdict) if verdict.is_success() => {
            println!(
                "{} {} ({:.2}s)",
                "PASS".green().bold(),
                scenario.name,
                duration_secs
            );
            Ok(RunResult {
                name: scenario.name,
                passed: true,
                duration_secs,
                error: None,
            })
        }
        Ok(verdict) => {
            println!("{} {}: {}", "FAIL".red().bold(), scenario.name, verdict);
            Ok(RunResult {
                name: scenario.name,
                passed: false,
                duration_secs,
                error: Some(verdict.to_string()),
            })
        }
        Err(e) => {
            println!("{} {}: {}", "FAIL".red().bold(), scenario.name, e);
            Ok(RunResult {
                name: scenario.name,
                passed: false,
                duration_secs,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Load and validate a scenario file without executing it
pub fn check_file(path: &Path, config: &HarnessConfig) -> Result<()> {
    let scenario = Scenario::load(path)?;
    scenario
        .validate(config)
        .map_err(|e| Error::Scenario(format!("{}: {}", path.display(), e)))?;
    println!(
        "{} {} ({} steps)",
        "OK".green(),
        scenario.name,
        scenario.steps.len()
    );
    Ok(())
}
