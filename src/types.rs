//! Small value types shared by inspection, style checking and reporting.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Represents a source location identified by file name and line number.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct LineRef {
    /// The line number within the file (1-based).
    pub line_number: usize,
    /// The file name associated with the finding.
    pub file_name:   String,
}

impl LineRef {
    /// Creates a new reference.
    pub fn new(file_name: impl Into<String>, line_number: usize) -> Self {
        Self {
            line_number,
            file_name: file_name.into(),
        }
    }

    /// Returns the file name for this reference.
    pub fn file_name(&self) -> &str {
        self.file_name.as_ref()
    }
}

impl Display for LineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_name, self.line_number)
    }
}

/// The category of a single grading finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A loop was found where loops are forbidden.
    LoopForbidden,
    /// A branching construct was found where conditionals are forbidden.
    ConditionalForbidden,
    /// A declaration has no (or an empty) docstring.
    MissingDocstring,
    /// A file the submission must contain is absent.
    MissingRequiredFile,
    /// A required top-level definition is absent.
    MissingSymbol,
    /// A style checker rule, identified by its code (e.g. `E501`).
    StyleRule(String),
    /// Produced output did not match the expectation.
    OutputMismatch,
    /// A pattern occurred an unexpected number of times.
    PatternCount,
}

impl Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::LoopForbidden => write!(f, "loop-forbidden"),
            ViolationKind::ConditionalForbidden => write!(f, "conditional-forbidden"),
            ViolationKind::MissingDocstring => write!(f, "missing-docstring"),
            ViolationKind::MissingRequiredFile => write!(f, "missing-required-file"),
            ViolationKind::MissingSymbol => write!(f, "missing-symbol"),
            ViolationKind::StyleRule(code) => write!(f, "{code}"),
            ViolationKind::OutputMismatch => write!(f, "output-mismatch"),
            ViolationKind::PatternCount => write!(f, "pattern-count"),
        }
    }
}

/// One style, docstring or structural failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// What kind of rule was broken.
    pub kind:     ViolationKind,
    /// Where, when known.
    pub location: Option<LineRef>,
    /// Human-readable description.
    pub message:  String,
}

impl Violation {
    /// Creates a violation without a location.
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            location: None,
            message: message.into(),
        }
    }

    /// Attaches a location to the violation.
    pub fn at(mut self, location: LineRef) -> Self {
        self.location = Some(location);
        self
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: [{}] {}", self.kind, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}
