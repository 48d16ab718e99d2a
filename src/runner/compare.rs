#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Output comparison and diff formatting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::error::UsageError;

/// How produced output is compared with the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Byte-for-byte equality.
    Exact,
    /// Equality after normalizing line endings and trailing whitespace.
    #[default]
    Trimmed,
    /// The expectation is a regular expression that must match somewhere in
    /// the output.
    Regex,
    /// The expectation must appear somewhere in the output.
    Contains,
}

/// Normalizes a string for comparison.
pub fn normalize(s: &str) -> String {
    s.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Returns true when `actual` satisfies `expected` under `mode`.
pub fn output_matches(actual: &str, expected: &str, mode: MatchMode) -> Result<bool, UsageError> {
    Ok(match mode {
        MatchMode::Exact => actual == expected,
        MatchMode::Trimmed => normalize(actual) == normalize(expected),
        MatchMode::Regex => Regex::new(expected)
            .map_err(|source| UsageError::InvalidPattern {
                pattern: expected.to_string(),
                source,
            })?
            .is_match(actual),
        MatchMode::Contains => actual.contains(expected),
    })
}

/// Formats a line diff between expected and actual output.
pub fn format_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Delete => "- ",
            ChangeTag::Insert => "+ ",
            ChangeTag::Equal => "  ",
        };
        output.push_str(prefix);
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}

/// Explains why `actual` does not satisfy `expected`.
pub fn mismatch_message(actual: &str, expected: &str, mode: MatchMode) -> String {
    match mode {
        MatchMode::Exact => format!(
            "Output does not match the expected output exactly:\n{}",
            format_diff(expected, actual)
        ),
        MatchMode::Trimmed => format!(
            "Output does not match the expected output:\n{}",
            format_diff(&normalize(expected), &normalize(actual))
        ),
        MatchMode::Regex => format!("Output does not match the pattern `{expected}`:\n{actual}"),
        MatchMode::Contains => format!("Output does not contain '{expected}':\n{actual}"),
    }
}

/// Explains why `actual` should not have satisfied `unexpected`.
pub fn unexpected_match_message(actual: &str, unexpected: &str, mode: MatchMode) -> String {
    match mode {
        MatchMode::Exact | MatchMode::Trimmed => {
            format!("Output should differ from:\n{unexpected}")
        }
        MatchMode::Regex => format!("Output should not match the pattern `{unexpected}`:\n{actual}"),
        MatchMode::Contains => format!("Output should not contain '{unexpected}':\n{actual}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimmed_ignores_line_endings_and_trailing_space() {
        assert!(output_matches("a  \r\nb\n\n", "a\nb", MatchMode::Trimmed).expect("compare"));
        assert!(!output_matches("a  \r\nb\n\n", "a\nb", MatchMode::Exact).expect("compare"));
    }

    #[test]
    fn regex_searches_anywhere() {
        assert!(output_matches("Total: 42\n", r"\d+", MatchMode::Regex).expect("compare"));
        assert!(output_matches("x", "(", MatchMode::Regex).is_err());
    }

    #[test]
    fn diff_marks_changed_lines() {
        let diff = format_diff("Hello\nWorld\n", "Hello\nThere\n");
        assert_eq!(diff, "  Hello\n- World\n+ There\n");
    }
}
