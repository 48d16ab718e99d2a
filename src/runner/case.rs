#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Test cases, their outcomes and the write-once outcome cell.

use std::{cell::OnceCell, fmt::Display};

use futures::future::{self, LocalBoxFuture};
use serde::Serialize;

use super::context::CaseContext;
use crate::{
    error::{CaseResult, FaultKind, GradeError, UsageError},
    types::Violation,
};

/// Future returned by a case body. Bodies run on the caller's task, so no
/// `Send` bound is required.
pub type CaseFuture<'a> = LocalBoxFuture<'a, CaseResult>;

/// A case body: borrows the context for the duration of the case.
type CaseBody = Box<dyn for<'a> Fn(&'a mut CaseContext) -> CaseFuture<'a>>;

/// Terminal state of a test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every assertion held.
    Passed,
    /// An assertion did not hold.
    Failed {
        /// Message shown to the student.
        message:    String,
        /// Findings behind the failure.
        violations: Vec<Violation>,
    },
    /// The case could not complete.
    Errored {
        /// What kind of fault occurred.
        kind:    FaultKind,
        /// Short description.
        message: String,
        /// Debug rendering of the error chain or panic payload.
        trace:   Option<String>,
    },
}

impl Outcome {
    /// A failure with only a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Outcome::Failed {
            message:    message.into(),
            violations: Vec::new(),
        }
    }

    /// Classifies a body's result.
    pub fn from_result(result: CaseResult) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(GradeError::Assertion(failure)) => Outcome::Failed {
                message:    failure.message,
                violations: failure.violations,
            },
            Err(err) => Outcome::Errored {
                kind:    err.fault_kind().unwrap_or(FaultKind::Infrastructure),
                message: err.to_string(),
                trace:   Some(format!("{err:?}")),
            },
        }
    }

    /// True for [`Outcome::Passed`].
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Short status label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed { .. } => "failed",
            Outcome::Errored { .. } => "errored",
        }
    }

    /// Failure or error message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { message, .. } | Outcome::Errored { message, .. } => Some(message),
        }
    }

    /// Appends a line to the message of a non-passing outcome.
    pub(crate) fn append_message(&mut self, extra: &str) {
        if let Outcome::Failed { message, .. } | Outcome::Errored { message, .. } = self {
            message.push('\n');
            message.push_str(extra);
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Errored { kind, .. } => write!(f, "errored ({kind})"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Lifecycle position of a case within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    /// Not started.
    Pending,
    /// Body is executing.
    Running,
    /// Outcome recorded.
    Finished,
}

/// Tracks one execution of a case; its outcome can be recorded only once.
#[derive(Debug)]
pub struct CaseRun {
    /// Case name, for error messages.
    name:    String,
    /// Current lifecycle position.
    state:   CaseState,
    /// The recorded outcome.
    outcome: OnceCell<Outcome>,
}

impl CaseRun {
    /// A pending run of the named case.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:    name.into(),
            state:   CaseState::Pending,
            outcome: OnceCell::new(),
        }
    }

    /// Marks the case as running.
    pub fn start(&mut self) {
        if self.state == CaseState::Pending {
            self.state = CaseState::Running;
        }
    }

    /// Current lifecycle position.
    pub fn state(&self) -> CaseState {
        self.state
    }

    /// Records the outcome; a second write is rejected.
    pub fn record(&mut self, outcome: Outcome) -> Result<(), UsageError> {
        self.outcome
            .set(outcome)
            .map_err(|_| UsageError::OutcomeAlreadyRecorded(self.name.clone()))?;
        self.state = CaseState::Finished;
        Ok(())
    }

    /// The recorded outcome, once finished.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.get()
    }

    /// Consumes the run, returning its outcome.
    pub fn into_outcome(self) -> Option<Outcome> {
        self.outcome.into_inner()
    }
}

/// One named check in a suite.
pub struct TestCase {
    /// Unique name within the suite.
    name:        String,
    /// Explicit ordering key.
    order:       Option<i64>,
    /// Position of registration within the suite.
    index:       usize,
    /// Symbols that must be defined before the body runs, per file.
    requires:    Vec<(String, Vec<String>)>,
    /// Failing this case fails every later case.
    required:    bool,
    /// Score contribution when passed.
    weight:      f64,
    /// Human-readable description.
    description: Option<String>,
    /// The checks themselves.
    body:        CaseBody,
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("index", &self.index)
            .field("required", &self.required)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    /// Creates a case with an async body.
    ///
    /// ```ignore
    /// TestCase::new("no_loops", |cx| Box::pin(async move {
    ///     cx.assert_no_loops("hello.py", LoopKind::Any)
    /// }))
    /// ```
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut CaseContext) -> CaseFuture<'a> + 'static,
    {
        Self {
            name:        name.into(),
            order:       None,
            index:       0,
            requires:    Vec::new(),
            required:    false,
            weight:      1.0,
            description: None,
            body:        Box::new(body),
        }
    }

    /// Creates a case whose body needs no awaiting.
    pub fn sync<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut CaseContext) -> CaseResult + 'static,
    {
        Self::new(name, move |cx| Box::pin(future::ready(body(cx))))
    }

    /// Sets an explicit ordering key.
    pub fn order(mut self, key: i64) -> Self {
        self.order = Some(key);
        self
    }

    /// Marks the case as a gate for every later case.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the score contribution.
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Sets a description, shown in reports and gate messages.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Requires `names` to be defined at module scope of `file` before the
    /// body runs.
    pub fn requires<I, S>(mut self, file: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires
            .push((file.into(), names.into_iter().map(Into::into).collect()));
        self
    }

    /// Case name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sort key: the explicit order, else the registration index.
    pub fn sort_key(&self) -> i64 {
        self.order.unwrap_or(self.index as i64)
    }

    /// Registration index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether failure gates later cases.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Score contribution.
    pub fn weight_value(&self) -> f64 {
        self.weight
    }

    /// Description, if set.
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Required symbols per file.
    pub fn required_symbols(&self) -> &[(String, Vec<String>)] {
        &self.requires
    }

    /// Assigns the registration index.
    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Starts the body.
    pub(crate) fn invoke<'a>(&self, cx: &'a mut CaseContext) -> CaseFuture<'a> {
        (self.body)(cx)
    }
}
