#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Aggregated results of a grading run, rendered as a table or JSON.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::{coverage::CoverageSection, runner::case::Outcome, runner::case::TestCase};

/// Which parts of failures to show in the human-readable rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportOptions {
    /// Show failure messages and case output.
    pub show_details: bool,
    /// Show traces of errored cases; implies `show_details`.
    pub show_trace:   bool,
}

impl ReportOptions {
    /// Normalizes the flags so that traces imply details.
    pub fn new(show_details: bool, show_trace: bool) -> Self {
        Self {
            show_details: show_details || show_trace,
            show_trace,
        }
    }
}

/// The outcome of one case with its score contribution.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    /// Case name.
    pub name:        String,
    /// Case description.
    pub description: Option<String>,
    /// How the case ended.
    pub outcome:     Outcome,
    /// Maximum score.
    pub weight:      f64,
    /// Score earned.
    pub score:       f64,
    /// Notes written by the case.
    pub output:      Vec<String>,
    /// Wall time spent in the case, in milliseconds.
    pub duration_ms: u128,
}

impl CaseReport {
    /// Builds the report for a finished case.
    pub fn new(case: &TestCase, outcome: Outcome, output: Vec<String>, duration: Duration) -> Self {
        let weight = case.weight_value();
        Self {
            name: case.name().to_string(),
            description: case.description_text().map(str::to_string),
            score: if outcome.is_passed() { weight } else { 0.0 },
            outcome,
            weight,
            output,
            duration_ms: duration.as_millis(),
        }
    }
}

/// One row of the overview table.
#[derive(Tabled)]
struct CaseRow {
    /// Case name.
    #[tabled(rename = "Test")]
    name:   String,
    /// Status label.
    #[tabled(rename = "Status")]
    status: String,
    /// `earned/max`.
    #[tabled(rename = "Score")]
    score:  String,
}

/// Results of a whole grading run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Suite name.
    suite:    String,
    /// Case results in execution order.
    cases:    Vec<CaseReport>,
    /// Coverage results, when coverage was collected.
    coverage: Option<CoverageSection>,
    /// Whether every case passed and coverage met its threshold.
    passed:   bool,
}

impl Report {
    /// Builds a report from case results.
    pub fn new(suite: impl Into<String>, cases: Vec<CaseReport>) -> Self {
        let passed = cases.iter().all(|c| c.outcome.is_passed());
        Self {
            suite: suite.into(),
            cases,
            coverage: None,
            passed,
        }
    }

    /// Adds coverage results; the report passes only if they do too.
    pub fn attach_coverage(&mut self, coverage: CoverageSection) {
        self.passed = self.cases.iter().all(|c| c.outcome.is_passed()) && coverage.passed;
        self.coverage = Some(coverage);
    }

    /// Suite name.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Case results in execution order.
    pub fn cases(&self) -> &[CaseReport] {
        &self.cases
    }

    /// Coverage results, if collected.
    pub fn coverage(&self) -> Option<&CoverageSection> {
        self.coverage.as_ref()
    }

    /// True when every case passed and coverage (if any) met its threshold.
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// The outcome of the named case.
    pub fn outcome_of(&self, name: &str) -> Option<&Outcome> {
        self.cases.iter().find(|c| c.name == name).map(|c| &c.outcome)
    }

    /// Earned and maximum score.
    pub fn score(&self) -> (f64, f64) {
        self.cases
            .iter()
            .fold((0f64, 0f64), |acc, c| (acc.0 + c.score, acc.1 + c.weight))
    }

    /// JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Could not serialize report")
    }

    /// Human-readable rendering.
    pub fn render(&self, options: ReportOptions) -> String {
        let options = ReportOptions::new(options.show_details, options.show_trace);
        let (grade, out_of) = self.score();

        let rows: Vec<CaseRow> = self
            .cases
            .iter()
            .map(|c| CaseRow {
                name:   c.name.clone(),
                status: c.outcome.to_string(),
                score:  format!("{:.2}/{:.2}", c.score, c.weight),
            })
            .collect();

        let mut out = Table::new(&rows)
            .with(Panel::header(format!("Results for {}", self.suite)))
            .with(Panel::footer(format!("Total: {grade:.2}/{out_of:.2}")))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(40).keep_words(true)))
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .with(Modify::new(Rows::last()).with(Alignment::center()))
            .with(Style::modern())
            .to_string();
        out.push('\n');

        if options.show_details {
            for case in &self.cases {
                let failing = !case.outcome.is_passed();
                if !failing && case.output.is_empty() {
                    continue;
                }
                out.push_str(&format!("\n{}\n", format!("── {} ──", case.name).bold()));
                for line in &case.output {
                    out.push_str(line);
                    out.push('\n');
                }
                if let Some(message) = case.outcome.message() {
                    out.push_str(message);
                    out.push('\n');
                }
                if options.show_trace
                    && let Outcome::Errored {
                        trace: Some(trace), ..
                    } = &case.outcome
                {
                    out.push_str(&format!("{}\n{trace}\n", "Trace:".dimmed()));
                }
            }
        }

        if let Some(coverage) = &self.coverage {
            out.push('\n');
            out.push_str(&coverage.render(options.show_details));
        }

        let verdict = if self.passed {
            "PASSED".green().bold()
        } else {
            "FAILED".red().bold()
        };
        out.push_str(&format!("\n{verdict}\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A case report with the given outcome.
    fn case(name: &str, outcome: Outcome) -> CaseReport {
        CaseReport::new(
            &TestCase::sync(name, |_| Ok(())).weight(2.0),
            outcome,
            vec![],
            Duration::from_millis(3),
        )
    }

    #[test]
    fn scores_follow_outcomes() {
        let report = Report::new(
            "demo",
            vec![case("a", Outcome::Passed), case("b", Outcome::failed("nope"))],
        );
        assert_eq!(report.score(), (2.0, 4.0));
        assert!(!report.passed());
        assert_eq!(report.outcome_of("b").and_then(Outcome::message), Some("nope"));
    }

    #[test]
    fn details_are_hidden_unless_requested() {
        colored::control::set_override(false);
        let report = Report::new("demo", vec![case("b", Outcome::failed("secret reason"))]);
        assert!(!report.render(ReportOptions::default()).contains("secret reason"));
        assert!(report.render(ReportOptions::new(true, false)).contains("secret reason"));
    }

    #[test]
    fn json_names_each_case() {
        let report = Report::new("demo", vec![case("a", Outcome::Passed)]);
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("json")).expect("parse");
        assert_eq!(json["cases"][0]["name"], "a");
        assert_eq!(json["cases"][0]["outcome"]["status"], "passed");
        assert_eq!(json["passed"], true);
    }
}
