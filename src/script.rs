#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Running student scripts as child processes.
//!
//! A script runs while holding the [`IoChannel`] slot: its standard input is
//! the scripted input of the substitution scope and everything it prints is
//! captured. The exit indicator is kept apart from the captured text.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fmt::Display,
    path::{Path, PathBuf},
    process::ExitStatus,
    time::Duration,
};

use anyhow::Result;
use bon::Builder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    coverage::CoverageSession,
    error::{AssertionFailure, GradeError, InfrastructureError},
    inspect::{parser::Parser, queries::MODULE_ASSIGNMENT_QUERY},
    io_channel::IoChannel,
    process::{ProcessError, StdinSource, run_collect},
    submission::Submission,
    types::{Violation, ViolationKind},
    util::{escape_input, python_path},
};

/// How a student script ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExitIndicator {
    /// Exit status zero.
    Success,
    /// Non-zero exit status.
    Code(i32),
    /// Terminated by a signal, when the platform reports one.
    Signal(Option<i32>),
    /// Killed after exceeding the time bound.
    TimedOut,
}

impl ExitIndicator {
    /// Classifies a finished process.
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            ExitIndicator::Success
        } else if let Some(code) = status.code() {
            ExitIndicator::Code(code)
        } else {
            ExitIndicator::Signal(signal_of(status))
        }
    }

    /// True for a zero exit status.
    pub fn is_success(self) -> bool {
        self == ExitIndicator::Success
    }
}

/// Signal that terminated the process.
#[cfg(unix)]
fn signal_of(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

/// Signal that terminated the process.
#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> Option<i32> {
    None
}

impl Display for ExitIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitIndicator::Success => write!(f, "exit status 0"),
            ExitIndicator::Code(code) => write!(f, "exit status {code}"),
            ExitIndicator::Signal(Some(sig)) => write!(f, "killed by signal {sig}"),
            ExitIndicator::Signal(None) => write!(f, "killed by a signal"),
            ExitIndicator::TimedOut => write!(f, "timed out"),
        }
    }
}

/// One execution of a student script.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct ScriptRequest {
    /// Script file name, relative to the submission root.
    #[builder(getter)]
    script:     String,
    /// Standard input, one entry per line.
    #[builder(default, with = |lines: impl IntoIterator<Item = impl Into<String>>| {
        lines.into_iter().map(Into::into).collect::<Vec<String>>()
    })]
    #[builder(getter)]
    input:      Vec<String>,
    /// Scaffolding file whose contents replace `input`.
    #[builder(getter)]
    input_file: Option<String>,
    /// Command-line arguments.
    #[builder(default, with = |args: impl IntoIterator<Item = impl Into<String>>| {
        args.into_iter().map(Into::into).collect::<Vec<String>>()
    })]
    #[builder(getter)]
    args:       Vec<String>,
    /// Module-scope assignments to rewrite before running, as name to Python
    /// expression.
    #[builder(default)]
    #[builder(getter)]
    variables:  BTreeMap<String, String>,
}

impl ScriptRequest {
    /// Shorthand for a script fed `input` lines.
    pub fn new<I, S>(script: impl Into<String>, input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder().script(script).input(input).build()
    }

    /// Script file name.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Input lines.
    pub fn input(&self) -> &[String] {
        &self.input
    }

    /// Command-line arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Result of running a script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptOutcome {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error, with the submission directory stripped from
    /// paths.
    pub stderr: String,
    /// How the process ended.
    pub exit:   ExitIndicator,
    /// The input that was fed, escaped for display.
    pub input:  String,
}

impl ScriptOutcome {
    /// Describes a run for inclusion in a failure message.
    pub fn describe(&self, args: &[String]) -> String {
        let mut message = if self.stderr.trim().is_empty() {
            format!("Input was: '{}'", self.input)
        } else {
            format!(
                "Error during script execution:\n{}\nOutput before failure:\n{}",
                self.stderr.trim_end(),
                self.stdout
            )
        };
        if !args.is_empty() {
            message.push_str(&format!("\nCommand line arguments: {}", args.join(" ")));
        }
        if !self.exit.is_success() {
            message.push_str(&format!("\nProcess ended with {}", self.exit));
        }
        message
    }
}

/// Replaces the right-hand side of module-scope `name = ...` assignments,
/// including right-hand sides that span several lines.
pub fn rewrite_variables(code: &str, variables: &BTreeMap<String, String>) -> Result<String> {
    if variables.is_empty() {
        return Ok(code.to_string());
    }

    let parser = Parser::new(code.to_string())?;
    let names = parser.query_captures(MODULE_ASSIGNMENT_QUERY, "name")?;
    let values = parser.query_captures(MODULE_ASSIGNMENT_QUERY, "value")?;

    let mut out = code.to_string();
    // back to front, so earlier byte ranges stay valid
    for (name, value) in names.iter().zip(&values).rev() {
        if let Some(replacement) = variables.get(&name.text) {
            out.replace_range(value.bytes.clone(), replacement);
        }
    }
    Ok(out)
}

/// Executes student scripts with the configured interpreter.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// Configured interpreter, if any.
    python:     Option<String>,
    /// Where scripts and scaffolding live.
    submission: Submission,
    /// Bound for one script.
    timeout:    Duration,
    /// Coverage collection, when installed.
    coverage:   Option<CoverageSession>,
}

impl ScriptRunner {
    /// Creates a runner.
    pub fn new(submission: Submission, python: Option<String>, timeout: Duration) -> Self {
        Self {
            python,
            submission,
            timeout,
            coverage: None,
        }
    }

    /// Installs or removes a coverage session.
    pub fn set_coverage(&mut self, session: Option<CoverageSession>) {
        self.coverage = session;
    }

    /// The installed coverage session.
    pub fn coverage(&self) -> Option<&CoverageSession> {
        self.coverage.as_ref()
    }

    /// The submission scripts run against.
    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    /// Resolves the interpreter.
    pub fn interpreter(&self) -> Result<PathBuf, GradeError> {
        python_path(self.python.as_deref()).map_err(|e| {
            InfrastructureError::ToolUnavailable {
                tool:   self.python.clone().unwrap_or_else(|| "python3".into()),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    /// Runs `request`, holding `channel` for the lifetime of the process.
    ///
    /// A missing script fails the case; a script that exceeds the time bound
    /// comes back with [`ExitIndicator::TimedOut`].
    pub async fn run(
        &self,
        channel: &IoChannel,
        request: &ScriptRequest,
    ) -> Result<ScriptOutcome, GradeError> {
        let script = self.submission.path(&request.script);
        if !script.is_file() {
            return Err(AssertionFailure::with_violations(
                format!("Missing {}", request.script),
                vec![Violation::new(
                    ViolationKind::MissingRequiredFile,
                    request.script.clone(),
                )],
            )
            .into());
        }

        let input_lines = match &request.input_file {
            Some(name) => self
                .submission
                .read_scaffolding(name)?
                .lines()
                .map(str::to_string)
                .collect(),
            None => request.input.clone(),
        };

        let interpreter = self.interpreter()?;
        let mut scope = channel.acquire(input_lines)?;
        let stdin = scope.drain_input_bytes();
        let shown = escape_input(&String::from_utf8_lossy(&stdin));

        let staged = self.stage(&script, &request.variables)?;

        let mut args: Vec<OsString> = Vec::new();
        let mut env: Vec<(OsString, OsString)> =
            vec![("PYTHONPATH".into(), self.submission.root().as_os_str().to_os_string())];
        if let Some(session) = &self.coverage {
            args.extend(session.run_args(self.submission.root()));
            env.push(session.env());
        }
        args.push(script.as_os_str().to_os_string());
        args.extend(request.args.iter().map(OsString::from));

        info!("Running {}", request.script);
        let result = run_collect(
            &interpreter,
            &args,
            StdinSource::Bytes(stdin),
            Some(self.submission.root()),
            &env,
            Some(self.timeout),
        )
        .await;

        drop(staged);

        let root_prefix = format!("{}/", self.submission.root().display());
        let outcome = match result {
            Ok(collected) => {
                let stdout = collected.stdout_text();
                let stderr = collected.stderr_text().replace(&root_prefix, "");
                scope.print(&stdout);
                scope.eprint(&stderr);
                ScriptOutcome {
                    stdout,
                    stderr,
                    exit: ExitIndicator::from_status(collected.status),
                    input: shown,
                }
            }
            Err(ProcessError::TimedOut(after)) => ScriptOutcome {
                stdout: String::new(),
                stderr: format!("Script did not finish within {after:?}"),
                exit:   ExitIndicator::TimedOut,
                input:  shown,
            },
            Err(ProcessError::Spawn { program, source }) => {
                return Err(InfrastructureError::ToolUnavailable {
                    tool:   program,
                    reason: source.to_string(),
                }
                .into());
            }
            Err(ProcessError::Io(e)) => return Err(InfrastructureError::Other(e).into()),
        };
        drop(scope.finish());

        debug!(script = %request.script, exit = %outcome.exit, "script finished");
        Ok(outcome)
    }

    /// Rewrites `script` in place when variables must be substituted. The
    /// script keeps its path, so coverage is attributed to the student's file.
    fn stage(
        &self,
        script: &Path,
        variables: &BTreeMap<String, String>,
    ) -> Result<Option<StagedScript>, GradeError> {
        if variables.is_empty() {
            return Ok(None);
        }

        let original = std::fs::read_to_string(script).map_err(|source| InfrastructureError::Io {
            path: script.to_path_buf(),
            source,
        })?;
        let rewritten = rewrite_variables(&original, variables).map_err(InfrastructureError::Other)?;
        std::fs::write(script, rewritten).map_err(|source| InfrastructureError::Io {
            path: script.to_path_buf(),
            source,
        })?;

        Ok(Some(StagedScript {
            path: script.to_path_buf(),
            original,
        }))
    }
}

/// A script rewritten in place; the submitted text is restored on drop.
#[derive(Debug)]
struct StagedScript {
    /// The rewritten file.
    path:     PathBuf,
    /// Text as submitted.
    original: String,
}

impl Drop for StagedScript {
    fn drop(&mut self) {
        if let Err(e) = std::fs::write(&self.path, &self.original) {
            warn!("Could not restore {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_replace_module_assignments_only() {
        let code = "LIMIT = 10\nTOTAL == 3\ndef f():\n    LIMIT = 2\nname = 'x'\n";
        let mut vars = BTreeMap::new();
        vars.insert("LIMIT".to_string(), "3".to_string());
        vars.insert("TOTAL".to_string(), "0".to_string());

        assert_eq!(
            rewrite_variables(code, &vars).expect("rewrite"),
            "LIMIT = 3\nTOTAL == 3\ndef f():\n    LIMIT = 2\nname = 'x'\n"
        );
    }

    #[test]
    fn multi_line_values_are_replaced_whole() {
        let code = "DATA = [\n    1,\n    2,\n]\nlabel: str = (\n    'a'\n    'b'\n)\nprint(DATA, label)\n";
        let mut vars = BTreeMap::new();
        vars.insert("DATA".to_string(), "[3]".to_string());
        vars.insert("label".to_string(), "'c'".to_string());

        assert_eq!(
            rewrite_variables(code, &vars).expect("rewrite"),
            "DATA = [3]\nlabel: str = 'c'\nprint(DATA, label)\n"
        );
    }

    #[test]
    fn failures_describe_stderr_before_input() {
        let outcome = ScriptOutcome {
            stdout: "partial\n".into(),
            stderr: "Traceback ...\nValueError\n".into(),
            exit:   ExitIndicator::Code(1),
            input:  "abc\\n".into(),
        };
        let text = outcome.describe(&[]);
        assert!(text.starts_with("Error during script execution:\nTraceback"));
        assert!(text.contains("Output before failure:\npartial"));
        assert!(text.ends_with("Process ended with exit status 1"));
    }

    #[test]
    fn clean_runs_echo_the_input() {
        let outcome = ScriptOutcome {
            stdout: "hi\n".into(),
            stderr: String::new(),
            exit:   ExitIndicator::Success,
            input:  "Bob\\n".into(),
        };
        assert_eq!(outcome.describe(&["-v".into()]), "Input was: 'Bob\\n'\nCommand line arguments: -v");
    }
}
