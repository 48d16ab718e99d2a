#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Grader configuration: JSON file, defaults and environment overrides.
//!
//! Nothing here is global. The binary builds one [`GraderConfig`] per run and
//! hands it to the case context.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Base directory used when neither the file nor the environment sets one.
pub const DEFAULT_BASE: &str = "/autograder";

/// Environment variable naming the grading base directory.
pub const BASE_ENV: &str = "GRADEKIT_BASE";

/// Settings for one grading run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraderConfig {
    /// Directory holding the student's files.
    pub submission_dir:      PathBuf,
    /// Scaffolding directory (input files, style configs, student tests).
    pub source_dir:          PathBuf,
    /// Files the submission must contain, relative to `submission_dir`.
    pub required_files:      Vec<String>,
    /// Python interpreter; resolved on `PATH` when unset.
    pub python:              Option<String>,
    /// Wall-time bound for one student script, in seconds.
    pub script_timeout_secs: u64,
    /// Wall-time bound for one style check, in seconds.
    pub style_timeout_secs:  u64,
    /// Style checker executable.
    pub flake8:              String,
    /// flake8 config for full style checks, relative to `source_dir`.
    pub style_config:        Option<PathBuf>,
    /// flake8 config for docstring checks, relative to `source_dir`.
    pub docstring_config:    Option<PathBuf>,
    /// Minimum aggregate coverage percentage for a passing report.
    pub coverage_threshold:  f64,
    /// Directory of student-written tests, relative to `source_dir`.
    pub student_tests_dir:   PathBuf,
    /// Show failure messages in the human-readable report.
    pub show_details:        bool,
    /// Show traces of errored cases; implies `show_details`.
    pub show_trace:          bool,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self::with_base(DEFAULT_BASE)
    }
}

/// Reads a duration in whole seconds from `env`, falling back to
/// `default_secs` when unset or malformed.
fn read_timeout_secs(env: &str, default_secs: u64) -> u64 {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default_secs)
}

impl GraderConfig {
    /// Defaults rooted at `base` (`<base>/submission`, `<base>/source`).
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            submission_dir:      base.join("submission"),
            source_dir:          base.join("source"),
            required_files:      Vec::new(),
            python:              None,
            script_timeout_secs: 10,
            style_timeout_secs:  30,
            flake8:              "flake8".into(),
            style_config:        None,
            docstring_config:    None,
            coverage_threshold:  100.0,
            student_tests_dir:   PathBuf::from("student_tests"),
            show_details:        true,
            show_trace:          false,
        }
    }

    /// Loads a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Could not parse config file {}", path.display()))
    }

    /// Applies `GRADEKIT_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base) = std::env::var(BASE_ENV) {
            let base = PathBuf::from(base.trim());
            self.submission_dir = base.join("submission");
            self.source_dir = base.join("source");
        }
        self.script_timeout_secs =
            read_timeout_secs("GRADEKIT_SCRIPT_TIMEOUT_SECS", self.script_timeout_secs);
        self.style_timeout_secs =
            read_timeout_secs("GRADEKIT_STYLE_TIMEOUT_SECS", self.style_timeout_secs);
        if let Some(threshold) = std::env::var("GRADEKIT_COVERAGE_THRESHOLD")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
        {
            self.coverage_threshold = threshold;
        }
        if let Ok(python) = std::env::var("GRADEKIT_PYTHON")
            && !python.trim().is_empty()
        {
            self.python = Some(python.trim().to_string());
        }

        debug!(?self, "resolved grader configuration");
        self
    }

    /// Loads `path` if given, otherwise defaults, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Bound for one student script.
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    /// Bound for one style check.
    pub fn style_timeout(&self) -> Duration {
        Duration::from_secs(self.style_timeout_secs)
    }

    /// Resolves a scaffolding path against `source_dir`.
    pub fn source_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.source_dir.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config: GraderConfig =
            serde_json::from_str(r#"{ "required_files": ["a.py"], "coverage_threshold": 75 }"#)
                .expect("parse");
        assert_eq!(config.required_files, vec!["a.py"]);
        assert_eq!(config.coverage_threshold, 75.0);
        assert_eq!(config.submission_dir, PathBuf::from("/autograder/submission"));
        assert_eq!(config.script_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed = serde_json::from_str::<GraderConfig>(r#"{ "timeout": 3 }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn base_sets_both_directories() {
        let config = GraderConfig::with_base("/tmp/run");
        assert_eq!(config.source_path("input.txt"), PathBuf::from("/tmp/run/source/input.txt"));
        assert_eq!(config.submission_dir, PathBuf::from("/tmp/run/submission"));
    }
}
