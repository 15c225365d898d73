//! Scenario configuration types
//!
//! Defines the data structures for deserializing YAML scenarios. A
//! scenario is an ordered script of steps; insertion order defines the
//! strict temporal order of execution. Scenarios can equally be built in
//! code; YAML is just a front-end over these types.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::common::config::HarnessConfig;
use crate::common::{Error, Result};
use crate::expect::Pattern;

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// The ordered sequence of steps to execute
    pub steps: Vec<Step>,
}

/// A single step in the execution flow
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Spawn a process and start draining its output
    Spawn {
        /// Name the rest of the scenario uses to refer to this process
        process: String,
        /// Program to execute (or the launcher's trailing argument)
        program: Option<PathBuf>,
        /// Arguments to pass to the program
        #[serde(default)]
        args: Vec<String>,
        /// Environment overrides for the child
        #[serde(default)]
        env: HashMap<String, String>,
        /// Launcher template from the harness configuration
        launcher: Option<String>,
        /// Keep the process out of the normal end-of-run termination set
        /// so it can outlive the rest of the scenario's processes
        #[serde(default)]
        detached: bool,
    },
    /// Write a line to a process's stdin
    Send { process: String, text: String },
    /// Block until a pattern appears in a process's output
    Expect {
        process: String,
        /// Regular expression over raw bytes
        pattern: Option<String>,
        /// Exact literal; mutually exclusive with `pattern`
        literal: Option<String>,
        /// Timeout in seconds (default: timeouts.expect_secs)
        timeout: Option<u64>,
    },
    /// Block until the configured success sentinel appears
    WaitSuccess {
        process: String,
        /// Timeout in seconds (default: timeouts.success_secs)
        timeout: Option<u64>,
    },
    /// Wait for a process's drain task to finish and check its status
    JoinDrain { process: String },
}

impl Scenario {
    /// Load a scenario from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
            .map_err(|e| Error::Scenario(format!("{}: {}", path.display(), e)))
    }

    /// Parse a scenario from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Scenario(e.to_string()))
    }

    /// Validate the scenario without spawning anything
    ///
    /// Checks that every pattern compiles, every referenced process is
    /// spawned by an earlier step, spawn steps are launchable, and the
    /// configured sentinel compiles.
    pub fn validate(&self, config: &HarnessConfig) -> Result<()> {
        config.sentinel.compile()?;

        let mut spawned: HashSet<&str> = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            let step_num = i + 1;

            let checked = match step {
                Step::Spawn {
                    process,
                    program,
                    launcher,
                    ..
                } => {
                    if spawned.contains(process.as_str()) {
                        Err(Error::Scenario(format!(
                            "duplicate process name '{}'",
                            process
                        )))
                    } else if program.is_none() && launcher.is_none() {
                        Err(Error::Scenario(format!(
                            "spawn step for '{}' needs a program or a launcher",
                            process
                        )))
                    } else {
                        let launchable = match launcher {
                            Some(name) => config.launcher(name).map(|_| ()),
                            None => Ok(()),
                        };
                        launchable.map(|_| {
                            spawned.insert(process.as_str());
                        })
                    }
                }
                Step::Send { process, .. }
                | Step::WaitSuccess { process, .. }
                | Step::JoinDrain { process } => known(&spawned, process),
                Step::Expect {
                    process,
                    pattern,
                    literal,
                    timeout,
                } => known(&spawned, process).and_then(|_| {
                    compile_expect(pattern.as_deref(), literal.as_deref(), *timeout).map(|_| ())
                }),
            };

            checked.map_err(|e| Error::step(step_num, e))?;
        }

        Ok(())
    }
}

fn known(spawned: &HashSet<&str>, process: &str) -> Result<()> {
    if spawned.contains(process) {
        Ok(())
    } else {
        Err(Error::UnknownProcess(process.to_string()))
    }
}

/// Build a pattern from an expect step's fields
pub fn compile_expect(
    pattern: Option<&str>,
    literal: Option<&str>,
    timeout: Option<u64>,
) -> Result<Pattern> {
    let compiled = match (pattern, literal) {
        (Some(_), Some(_)) => {
            return Err(Error::Scenario(
                "expect step cannot set both `pattern` and `literal`".to_string(),
            ))
        }
        (Some(p), None) => Pattern::regex(p)?,
        (None, Some(l)) => Pattern::literal(l.as_bytes()),
        (None, None) => {
            return Err(Error::Scenario(
                "expect step needs a `pattern` or a `literal`".to_string(),
            ))
        }
    };
    Ok(match timeout {
        Some(secs) => compiled.with_timeout(Duration::from_secs(secs)),
        None => compiled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONVERTER_YAML: &str = r#"
name: converter demo
description: string conversion between a client and a server
steps:
  - action: spawn
    process: server
    program: ./server
    args: ["--print-ready"]
  - action: expect
    process: server
    pattern: ".* ready"
  - action: spawn
    process: client
    program: ./client
  - action: expect
    process: client
    pattern: ".*==>"
  - action: send
    process: client
    text: "u"
  - action: expect
    process: server
    pattern: 'Received \(UTF-8\): "Bonne journ\351e"'
  - action: send
    process: server
    text: "s"
  - action: wait_success
    process: server
"#;

    #[test]
    fn test_parse_scenario_yaml() {
        let scenario = Scenario::from_yaml(CONVERTER_YAML).unwrap();
        assert_eq!(scenario.name, "converter demo");
        assert_eq!(scenario.steps.len(), 8);
        assert!(matches!(
            scenario.steps[0],
            Step::Spawn { ref process, .. } if process == "server"
        ));
        assert!(matches!(scenario.steps[7], Step::WaitSuccess { .. }));
    }

    #[test]
    fn test_validate_accepts_well_formed_scenario() {
        let scenario = Scenario::from_yaml(CONVERTER_YAML).unwrap();
        scenario.validate(&HarnessConfig::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_process() {
        let scenario = Scenario::from_yaml(
            r#"
name: bad
steps:
  - action: send
    process: ghost
    text: "u"
"#,
        )
        .unwrap();
        let err = scenario.validate(&HarnessConfig::default()).unwrap_err();
        match err {
            Error::Step { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, Error::UnknownProcess(_)));
            }
            other => panic!("expected Step error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let scenario = Scenario::from_yaml(
            r#"
name: bad
steps:
  - action: spawn
    process: p
    program: ./p
  - action: expect
    process: p
    pattern: "(unclosed"
"#,
        )
        .unwrap();
        assert!(scenario.validate(&HarnessConfig::default()).is_err());
    }

    #[test]
    fn test_compile_expect_rejects_ambiguous_fields() {
        assert!(compile_expect(Some("a"), Some("b"), None).is_err());
        assert!(compile_expect(None, None, None).is_err());
    }

    #[test]
    fn test_compile_expect_literal_and_timeout() {
        let p = compile_expect(None, Some("exact"), Some(7)).unwrap();
        assert_eq!(p.timeout(), Some(Duration::from_secs(7)));
        assert!(p.find(b"an exact match").is_some());
    }
}
