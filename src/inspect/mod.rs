#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Static inspection of Python submissions.
//!
//! [`SourceInspector`] loads each file at most once per grading run. Files are
//! parsed with tree-sitter; a file with a syntax error is analysed textually
//! instead, and the parse error is kept on the unit for reporting.

/// Tree-sitter parser wrapper
pub mod parser;
/// Tree-sitter queries
pub mod queries;
/// Source units and their structural summaries
pub mod source;
/// Textual analysis used when parsing fails
mod fallback;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use self::source::{
    Analysis, Construct, ConstructKind, Definition, DefinitionKind, MissingDocstring, SourceUnit,
    StructuralSummary,
};
use crate::{
    error::{AssertionFailure, GradeError, InfrastructureError, ParseError},
    types::{Violation, ViolationKind},
};

/// Which loop statements a query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    /// `for` loops only.
    For,
    /// `while` loops only.
    While,
    /// Either kind.
    #[default]
    Any,
}

impl LoopKind {
    /// Returns true when `construct` is a loop of this kind.
    pub fn matches(self, construct: ConstructKind) -> bool {
        matches!(
            (self, construct),
            (LoopKind::For | LoopKind::Any, ConstructKind::ForLoop)
                | (LoopKind::While | LoopKind::Any, ConstructKind::WhileLoop)
        )
    }
}

/// Which declarations must carry docstrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocstringScope {
    /// The module docstring only.
    Module,
    /// Functions and methods.
    Functions,
    /// Classes.
    Classes,
    /// The module and every function, method and class.
    #[default]
    All,
}

impl DocstringScope {
    /// Whether the module docstring is in scope.
    pub fn includes_module(self) -> bool {
        matches!(self, DocstringScope::Module | DocstringScope::All)
    }

    /// Whether declarations of `kind` are in scope.
    pub fn includes(self, kind: DefinitionKind) -> bool {
        match self {
            DocstringScope::Module => false,
            DocstringScope::Functions => kind == DefinitionKind::Function,
            DocstringScope::Classes => kind == DefinitionKind::Class,
            DocstringScope::All => true,
        }
    }
}

/// Whether to stop at the first missing docstring or list all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Report only the first finding.
    First,
    /// Report every finding.
    #[default]
    All,
}

/// Errors raised while loading a source unit.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The file does not exist.
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    /// The file exists but could not be read.
    #[error("could not read {}: {source}", path.display())]
    Io {
        /// File being read.
        path:   PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file has a syntax error.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The grammar or a query failed.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<InspectError> for GradeError {
    fn from(err: InspectError) -> Self {
        match err {
            InspectError::NotFound(path) => {
                let name = path.display().to_string();
                AssertionFailure::with_violations(
                    format!("Missing {name}"),
                    vec![Violation::new(ViolationKind::MissingRequiredFile, name)],
                )
                .into()
            }
            InspectError::Io { path, source } => InfrastructureError::Io { path, source }.into(),
            InspectError::Parse(err) => GradeError::Parse(err),
            InspectError::Internal(err) => InfrastructureError::Other(err).into(),
        }
    }
}

/// Loads and caches source units for the duration of one grading run.
#[derive(Debug, Default)]
pub struct SourceInspector {
    /// Units keyed by the path they were requested with.
    cache: HashMap<PathBuf, Arc<SourceUnit>>,
}

impl SourceInspector {
    /// Creates an inspector with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unit for `path`, reading it on first use.
    ///
    /// A file with a syntax error is analysed textually; the error is logged
    /// and kept on the unit. Later edits to the file are not observed.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Arc<SourceUnit>, InspectError> {
        let path = path.as_ref();
        if let Some(unit) = self.cache.get(path) {
            return Ok(Arc::clone(unit));
        }

        let code = source::read_source(path)?;
        let unit = match SourceUnit::from_source(path, code.clone()) {
            Ok(unit) => unit,
            Err(InspectError::Parse(err)) => {
                warn!(
                    "{} does not parse ({}); falling back to textual analysis",
                    path.display(),
                    err
                );
                SourceUnit::textual(path, code, err)?
            }
            Err(err) => return Err(err),
        };
        debug!(path = %path.display(), analysis = ?unit.analysis(), "loaded source unit");

        let unit = Arc::new(unit);
        self.cache.insert(path.to_path_buf(), Arc::clone(&unit));
        Ok(unit)
    }

    /// Returns a unit already loaded in this run.
    pub fn cached(&self, path: impl AsRef<Path>) -> Option<Arc<SourceUnit>> {
        self.cache.get(path.as_ref()).cloned()
    }

    /// Forgets every loaded unit.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_kind_filters() {
        assert!(LoopKind::Any.matches(ConstructKind::WhileLoop));
        assert!(LoopKind::For.matches(ConstructKind::ForLoop));
        assert!(!LoopKind::For.matches(ConstructKind::WhileLoop));
        assert!(!LoopKind::Any.matches(ConstructKind::If));
    }

    #[test]
    fn missing_files_become_assertion_failures() {
        let err: GradeError = InspectError::NotFound(PathBuf::from("b.py")).into();
        match err {
            GradeError::Assertion(failure) => {
                assert_eq!(failure.violations.len(), 1);
                assert_eq!(failure.violations[0].message, "b.py");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
