#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Regular-expression occurrence counting.

use std::fmt::Display;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::UsageError;

/// A constraint on how many times a pattern may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CountPredicate {
    /// Exactly `n` occurrences.
    Exactly(usize),
    /// At least `n` occurrences.
    AtLeast(usize),
    /// At most `n` occurrences.
    AtMost(usize),
    /// Between `lo` and `hi` occurrences, inclusive.
    Between(usize, usize),
}

impl CountPredicate {
    /// Returns true when `count` satisfies the constraint.
    pub fn satisfied_by(self, count: usize) -> bool {
        match self {
            CountPredicate::Exactly(n) => count == n,
            CountPredicate::AtLeast(n) => count >= n,
            CountPredicate::AtMost(n) => count <= n,
            CountPredicate::Between(lo, hi) => (lo..=hi).contains(&count),
        }
    }
}

impl Display for CountPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountPredicate::Exactly(n) => write!(f, "exactly {n}"),
            CountPredicate::AtLeast(n) => write!(f, "at least {n}"),
            CountPredicate::AtMost(n) => write!(f, "at most {n}"),
            CountPredicate::Between(lo, hi) => write!(f, "between {lo} and {hi}"),
        }
    }
}

/// Compiles `pattern`, reporting failures as usage errors.
fn compile(pattern: &str) -> Result<Regex, UsageError> {
    Regex::new(pattern).map_err(|source| UsageError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Counts non-overlapping, leftmost-first occurrences of `pattern` in `text`.
pub fn count(text: &str, pattern: &str) -> Result<usize, UsageError> {
    Ok(compile(pattern)?.find_iter(text).count())
}

/// Returns true when the number of occurrences satisfies `predicate`.
pub fn count_satisfies(
    text: &str,
    pattern: &str,
    predicate: CountPredicate,
) -> Result<bool, UsageError> {
    Ok(predicate.satisfied_by(count(text, pattern)?))
}

/// A compiled pattern with its expected occurrence count.
#[derive(Debug, Clone)]
pub struct MatchSpec {
    /// The compiled expression.
    regex:     Regex,
    /// The expected count.
    predicate: CountPredicate,
}

impl MatchSpec {
    /// Compiles `pattern` once for repeated use.
    pub fn new(pattern: &str, predicate: CountPredicate) -> Result<Self, UsageError> {
        Ok(Self {
            regex: compile(pattern)?,
            predicate,
        })
    }

    /// The pattern source.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The expected count.
    pub fn predicate(&self) -> CountPredicate {
        self.predicate
    }

    /// Counts occurrences in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.regex.find_iter(text).count()
    }

    /// Returns the count and whether it satisfies the predicate.
    pub fn check(&self, text: &str) -> (usize, bool) {
        let n = self.count(text);
        (n, self.predicate.satisfied_by(n))
    }
}
