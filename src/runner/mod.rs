#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Ordered test suites and the assertion vocabulary their cases use.

/// Test cases and outcomes
pub mod case;
/// Output comparison
pub mod compare;
/// The per-run context and `Assertable`
pub mod context;
/// Suites and their sequential runner
pub mod suite;

pub use self::{
    case::{CaseFuture, Outcome, TestCase},
    compare::MatchMode,
    context::{Assertable, CaseContext, annotate},
    suite::Suite,
};
