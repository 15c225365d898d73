//! Configuration file handling
//!
//! The harness reads an optional TOML file with default timeouts, the
//! success sentinel, named launcher templates, and workspace root
//! discovery settings. The resolved configuration is passed by value into
//! each `ScenarioDriver`; there is no process-wide singleton.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};
use crate::expect::Pattern;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HarnessConfig {
    /// Named launch templates (program, fixed arguments, environment)
    #[serde(default)]
    pub launchers: HashMap<String, LauncherConfig>,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Success sentinel settings
    #[serde(default)]
    pub sentinel: Sentinel,

    /// Workspace root discovery settings
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

/// A launch template for a class of processes
///
/// Spawn steps referring to a launcher inherit its program, prepend its
/// fixed arguments, and merge its environment overrides (a classpath-style
/// search path, for example) with the step's own.
#[derive(Debug, Deserialize, Clone)]
pub struct LauncherConfig {
    /// Program to execute
    pub program: PathBuf,

    /// Arguments placed before the step's own arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables merged into the child's environment
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Default timeout for expect steps
    #[serde(default = "default_expect")]
    pub expect_secs: u64,

    /// Default timeout for wait_success steps
    #[serde(default = "default_success")]
    pub success_secs: u64,

    /// Grace period between closing a process's stdin and killing it
    #[serde(default = "default_grace")]
    pub terminate_grace_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            expect_secs: default_expect(),
            success_secs: default_success(),
            terminate_grace_ms: default_grace(),
        }
    }
}

fn default_expect() -> u64 {
    30
}
fn default_success() -> u64 {
    60
}
fn default_grace() -> u64 {
    500
}

/// The pattern whose appearance in a process's output signals test success
#[derive(Debug, Deserialize, Clone)]
pub struct Sentinel {
    /// Pattern text
    #[serde(default = "default_sentinel")]
    pub pattern: String,

    /// Interpret the pattern as a regular expression instead of a literal
    #[serde(default)]
    pub regex: bool,
}

impl Default for Sentinel {
    fn default() -> Self {
        Self {
            pattern: default_sentinel(),
            regex: false,
        }
    }
}

fn default_sentinel() -> String {
    "test succeeded".to_string()
}

impl Sentinel {
    /// Compile the sentinel into a matchable pattern
    pub fn compile(&self) -> Result<Pattern> {
        if self.regex {
            Pattern::regex(&self.pattern)
        } else {
            Ok(Pattern::literal(self.pattern.as_bytes()))
        }
    }
}

/// Workspace root discovery
///
/// Scenarios often spawn programs by a path relative to a project root.
/// The root is either given explicitly or discovered by walking up from
/// the current directory looking for a marker file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkspaceConfig {
    /// Explicit workspace root; skips discovery when set
    pub root: Option<PathBuf>,

    /// Marker file names that identify the workspace root
    #[serde(default)]
    pub markers: Vec<String>,
}

impl WorkspaceConfig {
    /// Resolve the workspace root starting from `start`
    ///
    /// Returns `Ok(None)` when neither an explicit root nor markers are
    /// configured. Fails with a configuration error listing every searched
    /// path when the markers are not found in `start` or any ancestor.
    pub fn resolve(&self, start: &Path) -> Result<Option<PathBuf>> {
        if let Some(root) = &self.root {
            if !root.is_dir() {
                return Err(Error::configuration(
                    "configured workspace root does not exist",
                    &[root.display().to_string()],
                ));
            }
            return Ok(Some(root.clone()));
        }

        if self.markers.is_empty() {
            return Ok(None);
        }

        let mut searched = Vec::new();
        let mut dir = Some(start);
        while let Some(d) = dir {
            for marker in &self.markers {
                if d.join(marker).exists() {
                    return Ok(Some(d.to_path_buf()));
                }
            }
            searched.push(d.display().to_string());
            dir = d.parent();
        }

        Err(Error::configuration(
            "workspace root markers not found",
            &searched,
        ))
    }
}

impl HarnessConfig {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if the file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Get a launcher template by name
    pub fn launcher(&self, name: &str) -> Result<&LauncherConfig> {
        self.launchers.get(name).ok_or_else(|| {
            Error::Scenario(format!("no launcher named '{}' in configuration", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeouts.expect_secs, 30);
        assert_eq!(config.timeouts.success_secs, 60);
        assert_eq!(config.sentinel.pattern, "test succeeded");
        assert!(!config.sentinel.regex);
        assert!(config.launchers.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [launchers.java]
            program = "java"
            args = ["-cp", "classes"]
            env = { CLASSPATH = "classes" }

            [timeouts]
            expect_secs = 5
            success_secs = 10

            [sentinel]
            pattern = ".*: ok"
            regex = true
        "#;
        let config: HarnessConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.timeouts.expect_secs, 5);
        assert!(config.sentinel.regex);
        let java = config.launcher("java").unwrap();
        assert_eq!(java.args, vec!["-cp", "classes"]);
        assert_eq!(java.env.get("CLASSPATH").unwrap(), "classes");
    }

    #[test]
    fn test_workspace_discovery_finds_marker() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("harness.toml"), "").unwrap();

        let workspace = WorkspaceConfig {
            root: None,
            markers: vec!["harness.toml".to_string()],
        };
        let root = workspace.resolve(&nested).unwrap().unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn test_workspace_discovery_reports_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = WorkspaceConfig {
            root: None,
            markers: vec!["no-such-marker-file".to_string()],
        };
        let err = workspace.resolve(dir.path()).unwrap_err();
        match err {
            Error::Configuration { searched, .. } => {
                assert!(searched.contains(&dir.path().display().to_string()));
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_unconfigured_workspace_resolves_to_none() {
        let workspace = WorkspaceConfig::default();
        assert!(workspace.resolve(Path::new(".")).unwrap().is_none());
    }
}
