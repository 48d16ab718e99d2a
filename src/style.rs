#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Style and docstring-convention checks through `flake8`.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use bon::Builder;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    error::{AssertionFailure, GradeError, InfrastructureError},
    process::{ProcessError, StdinSource, run_collect},
    types::{LineRef, Violation, ViolationKind},
    util::program_path,
};

/// Which rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ruleset {
    /// Full style configuration.
    #[default]
    Full,
    /// Docstring conventions only.
    DocstringOnly,
}

/// Errors that keep a style check from producing a verdict.
#[derive(Debug, Error)]
pub enum StyleError {
    /// The checker is not installed, could not start, or crashed without
    /// producing findings.
    #[error("style checker `{tool}` is unavailable: {reason}")]
    ToolUnavailable {
        /// Program that was requested.
        tool:   String,
        /// What went wrong.
        reason: String,
    },
    /// The checker did not finish in time.
    #[error("style checker `{tool}` timed out after {after:?}")]
    Timeout {
        /// Program that was running.
        tool:  String,
        /// Bound that was exceeded.
        after: Duration,
    },
    /// The file to check does not exist.
    #[error("{} not found", .0.display())]
    MissingTarget(PathBuf),
}

impl From<StyleError> for GradeError {
    fn from(err: StyleError) -> Self {
        match err {
            StyleError::ToolUnavailable { tool, reason } => {
                InfrastructureError::ToolUnavailable { tool, reason }.into()
            }
            StyleError::Timeout { tool, after } => InfrastructureError::Timeout { tool, after }.into(),
            StyleError::MissingTarget(path) => {
                let name = path.display().to_string();
                AssertionFailure::with_violations(
                    format!("Missing {name}"),
                    vec![Violation::new(ViolationKind::MissingRequiredFile, name)],
                )
                .into()
            }
        }
    }
}

/// Findings of one style check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StyleReport {
    /// Parsed findings, in checker order.
    pub violations: Vec<Violation>,
    /// Raw checker output with directory prefixes removed.
    pub output:     String,
}

impl StyleReport {
    /// True when the checker found nothing.
    pub fn clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Runs `flake8` against single files.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct StyleChecker {
    /// Checker executable.
    #[builder(default = "flake8".to_string())]
    #[builder(getter)]
    program:          String,
    /// Config used for [`Ruleset::Full`].
    #[builder(into)]
    full_config:      Option<PathBuf>,
    /// Config used for [`Ruleset::DocstringOnly`]; without one the checker
    /// selects the `D` rules.
    #[builder(into)]
    docstring_config: Option<PathBuf>,
    /// Wall-time bound for one check.
    #[builder(default = Duration::from_secs(30))]
    #[builder(getter)]
    timeout:          Duration,
}

impl Default for StyleChecker {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StyleChecker {
    /// Command-line arguments for checking `path` with `ruleset`.
    fn args(&self, path: &Path, ruleset: Ruleset) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match (ruleset, &self.full_config, &self.docstring_config) {
            (Ruleset::Full, Some(config), _) | (Ruleset::DocstringOnly, _, Some(config)) => {
                let mut flag = OsString::from("--config=");
                flag.push(config);
                args.push(flag);
            }
            (Ruleset::DocstringOnly, _, None) => args.push("--select=D".into()),
            (Ruleset::Full, None, _) => {}
        }
        args.push(path.as_os_str().to_os_string());
        args
    }

    /// Checks one file.
    pub async fn check(&self, path: impl AsRef<Path>, ruleset: Ruleset) -> Result<StyleReport, StyleError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StyleError::MissingTarget(path.to_path_buf()));
        }

        let program = program_path(&self.program).map_err(|reason| StyleError::ToolUnavailable {
            tool: self.program.clone(),
            reason,
        })?;

        let collected = run_collect(
            &program,
            &self.args(path, ruleset),
            StdinSource::Null,
            None,
            &[],
            Some(self.timeout),
        )
        .await
        .map_err(|e| match e {
            ProcessError::TimedOut(after) => StyleError::Timeout {
                tool: self.program.clone(),
                after,
            },
            other => StyleError::ToolUnavailable {
                tool:   self.program.clone(),
                reason: other.to_string(),
            },
        })?;

        let stdout = collected.stdout_text();
        let violations = parse_flake8_output(&stdout);
        let code = collected.status.code();
        debug!(
            file = %path.display(),
            ?ruleset,
            ?code,
            findings = violations.len(),
            "style check finished"
        );

        if violations.is_empty() && code != Some(0) {
            let stderr = collected.stderr_text();
            warn!("{} exited with {:?}: {}", self.program, code, stderr.trim());
            return Err(StyleError::ToolUnavailable {
                tool:   self.program.clone(),
                reason: format!("exited with {:?}: {}", code, stderr.trim()),
            });
        }

        let prefix = path
            .parent()
            .map(|p| format!("{}/", p.display()))
            .unwrap_or_default();
        let output = if prefix == "/" {
            stdout
        } else {
            stdout.replace(&prefix, "")
        };

        Ok(StyleReport { violations, output })
    }
}

/// Parses `path:row:col: CODE text` lines; anything else is ignored.
pub fn parse_flake8_output(output: &str) -> Vec<Violation> {
    output.lines().filter_map(parse_flake8_line).collect()
}

/// Parses one finding line.
fn parse_flake8_line(line: &str) -> Option<Violation> {
    let (location, rest) = line.split_once(": ")?;
    let mut parts = location.rsplitn(3, ':');
    let _column: usize = parts.next()?.trim().parse().ok()?;
    let row: usize = parts.next()?.trim().parse().ok()?;
    let path = parts.next()?;
    let (code, text) = rest.trim().split_once(' ')?;

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    Some(
        Violation::new(ViolationKind::StyleRule(code.to_string()), text.trim())
            .at(LineRef::new(file_name, row)),
    )
}
