//! # gradekit
//!
//! Ordered test suites, static source inspection and output checks for
//! grading Python submissions.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Grader configuration
pub mod config;
/// Line coverage of student files
pub mod coverage;
/// Error taxonomy
pub mod error;
/// Static inspection of Python sources
pub mod inspect;
/// Scoped stdio substitution
pub mod io_channel;
/// Pattern counting
pub mod pattern;
/// Subprocess execution
pub mod process;
/// Grading reports
pub mod report;
/// Ordered suites, cases and assertions
pub mod runner;
/// Student script execution
pub mod script;
/// External style checks
pub mod style;
/// The submitted files
pub mod submission;
/// Declarative suite files
pub mod suite_file;
/// Shared value types
pub mod types;
/// Utility functions for convenience
pub mod util;

pub use crate::{
    config::GraderConfig,
    coverage::CoverageRunner,
    error::{AssertionFailure, CaseResult, GradeError},
    report::{Report, ReportOptions},
    runner::{Assertable, CaseContext, Suite, TestCase},
};
