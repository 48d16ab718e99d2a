#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Error taxonomy shared by the inspection, execution and runner layers.
//!
//! A [`GradeError`] returned from a test case decides how the case is
//! recorded: assertion failures mark it failed, everything else marks it
//! errored with a [`FaultKind`].

use std::{path::PathBuf, time::Duration};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Violation;

/// An expected grading condition was not met.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AssertionFailure {
    /// Message shown to the student.
    pub message:    String,
    /// Individual findings behind the failure, if any.
    pub violations: Vec<Violation>,
}

impl AssertionFailure {
    /// A failure carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message:    message.into(),
            violations: Vec::new(),
        }
    }

    /// A failure whose message is followed by one line per violation.
    pub fn with_violations(message: impl Into<String>, violations: Vec<Violation>) -> Self {
        let mut message = message.into();
        if !violations.is_empty() {
            message.push('\n');
            message.push_str(&violations.iter().map(|v| format!("  {v}")).join("\n"));
        }
        Self {
            message,
            violations,
        }
    }
}

/// The grading run could not complete a check for reasons unrelated to the
/// submission's correctness.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    /// An external tool is missing or could not be started.
    #[error("`{tool}` is unavailable: {reason}")]
    ToolUnavailable {
        /// Tool that was requested.
        tool:   String,
        /// Why it could not be used.
        reason: String,
    },
    /// An external tool exceeded its time bound.
    #[error("`{tool}` timed out after {after:?}")]
    Timeout {
        /// Tool that was running.
        tool:  String,
        /// The bound that was exceeded.
        after: Duration,
    },
    /// File system access failed.
    #[error("could not access {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path:   PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Anything else that prevented the check from running.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Submitted source could not be parsed.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{}:{line}: {message}", path.display())]
pub struct ParseError {
    /// File that failed to parse.
    pub path:    PathBuf,
    /// First line containing a syntax error (1-based).
    pub line:    usize,
    /// Description of the problem.
    pub message: String,
}

/// The grading core was used incorrectly by the suite author.
#[derive(Debug, Error)]
pub enum UsageError {
    /// A substitution scope was entered while another is active on the same
    /// channel.
    #[error("an input/output substitution is already active on channel `{0}`")]
    NestedSubstitution(String),
    /// A regular expression failed to compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source:  regex::Error,
    },
    /// A test case outcome was written twice.
    #[error("outcome for case `{0}` was already recorded")]
    OutcomeAlreadyRecorded(String),
    /// Any other misuse.
    #[error("{0}")]
    Invalid(String),
}

/// Everything a test case body can fail with.
#[derive(Debug, Error)]
pub enum GradeError {
    /// Expected grading condition not met; the case fails.
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
    /// The check could not complete; the case errors.
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] InfrastructureError),
    /// Source parsing failed where no fallback applies; the case errors.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// The core was misused; the case errors.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
}

/// Result type returned by test case bodies and assertions.
pub type CaseResult<T = ()> = Result<T, GradeError>;

/// Classification of a fault that is not an assertion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// External tool or file system problem.
    Infrastructure,
    /// Unrecoverable parse problem.
    Parse,
    /// Misuse of the grading core.
    Usage,
    /// The case body panicked.
    Panic,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Infrastructure => write!(f, "infrastructure"),
            FaultKind::Parse => write!(f, "parse"),
            FaultKind::Usage => write!(f, "usage"),
            FaultKind::Panic => write!(f, "panic"),
        }
    }
}

impl GradeError {
    /// Returns the fault classification, or `None` for assertion failures.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            GradeError::Assertion(_) => None,
            GradeError::Infrastructure(_) => Some(FaultKind::Infrastructure),
            GradeError::Parse(_) => Some(FaultKind::Parse),
            GradeError::Usage(_) => Some(FaultKind::Usage),
        }
    }
}

/// Fails the current case with `message`, like `unittest`'s `fail`.
pub fn fail<T>(message: impl Into<String>) -> CaseResult<T> {
    Err(AssertionFailure::new(message).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViolationKind;

    #[test]
    fn violations_are_listed_under_the_message() {
        let failure = AssertionFailure::with_violations(
            "Missing some required files!",
            vec![Violation::new(ViolationKind::MissingRequiredFile, "b.py")],
        );
        assert_eq!(
            failure.message,
            "Missing some required files!\n  [missing-required-file] b.py"
        );
    }

    #[test]
    fn only_assertions_lack_a_fault_kind() {
        let err: GradeError = AssertionFailure::new("nope").into();
        assert_eq!(err.fault_kind(), None);

        let err: GradeError = UsageError::Invalid("bad".into()).into();
        assert_eq!(err.fault_kind(), Some(FaultKind::Usage));
    }
}
