#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Declarative suites: a JSON file listing ordered cases and their checks.
//!
//! ```json
//! {
//!   "name": "hello",
//!   "cases": [
//!     { "name": "files", "required": true,
//!       "checks": [{ "kind": "required_files", "files": ["hello.py"] }] },
//!     { "name": "output", "order": 5,
//!       "checks": [{ "kind": "script_output", "script": "hello.py",
//!                    "input": ["Ada"], "expected": "Hello, Ada!" }] }
//!   ]
//! }
//! ```

use std::{collections::BTreeMap, path::Path, rc::Rc};

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

use crate::{
    coverage::CoverageRunner,
    error::{CaseResult, UsageError},
    inspect::{DocstringScope, LoopKind},
    pattern::CountPredicate,
    runner::{
        case::TestCase,
        compare::MatchMode,
        context::{Assertable, CaseContext, annotate},
        suite::Suite,
    },
    script::ScriptRequest,
    style::Ruleset,
};

/// A suite as written in a suite file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSpec {
    /// Suite name.
    pub name:  String,
    /// Cases in registration order.
    #[serde(default)]
    pub cases: Vec<CaseSpec>,
}

/// Default score contribution of a case.
fn default_weight() -> f64 {
    1.0
}

/// One case of a suite file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseSpec {
    /// Case name.
    pub name:        String,
    /// Explicit ordering key.
    #[serde(default)]
    pub order:       Option<i64>,
    /// Gate every later case on this one.
    #[serde(default)]
    pub required:    bool,
    /// Score contribution.
    #[serde(default = "default_weight")]
    pub weight:      f64,
    /// Shown in reports and gate messages.
    #[serde(default)]
    pub description: Option<String>,
    /// Appended to assertion failure messages.
    #[serde(default)]
    pub note:        Option<String>,
    /// Symbols that must be defined, per file, before the checks run.
    #[serde(default)]
    pub requires:    BTreeMap<String, Vec<String>>,
    /// Checks, run in order; the first failure ends the case.
    #[serde(default)]
    pub checks:      Vec<Check>,
}

/// A single assertion.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Files must exist; the configured list when `files` is empty.
    RequiredFiles {
        /// Paths relative to the submission root.
        #[serde(default)]
        files: Vec<String>,
    },
    /// Names must be defined at module scope.
    RequiredSymbols {
        /// File to inspect.
        file:  String,
        /// Required names.
        names: Vec<String>,
    },
    /// No loops of the given kind.
    NoLoops {
        /// File to inspect.
        file:  String,
        /// Loop kind.
        #[serde(default)]
        loops: LoopKind,
    },
    /// No branching outside the main guard.
    NoConditionals {
        /// File to inspect.
        file: String,
    },
    /// Every declaration in scope has a docstring.
    Docstrings {
        /// File to inspect.
        file:  String,
        /// Which declarations.
        #[serde(default)]
        scope: DocstringScope,
    },
    /// A pattern occurs a constrained number of times.
    MatchCount {
        /// File to inspect.
        file:          String,
        /// Regular expression.
        pattern:       String,
        /// Count constraint.
        count:         CountPredicate,
        /// Count inside comments and docstrings too.
        #[serde(default)]
        keep_comments: bool,
    },
    /// A script's output matches (or, with `differs`, does not match).
    ScriptOutput {
        /// Script, relative to the submission root.
        script:        String,
        /// Input lines.
        #[serde(default)]
        input:         Vec<String>,
        /// Scaffolding file used as input instead of `input`.
        #[serde(default)]
        input_file:    Option<String>,
        /// Command-line arguments.
        #[serde(default)]
        args:          Vec<String>,
        /// Module-scope assignments to rewrite.
        #[serde(default)]
        variables:     BTreeMap<String, String>,
        /// Expected output.
        #[serde(default)]
        expected:      Option<String>,
        /// Scaffolding file holding the expected output instead of
        /// `expected`.
        #[serde(default)]
        expected_file: Option<String>,
        /// Comparison mode.
        #[serde(default)]
        mode:          MatchMode,
        /// Fail when the output matches instead.
        #[serde(default)]
        differs:       bool,
    },
    /// The style checker reports nothing.
    Style {
        /// File to check.
        file:    String,
        /// Rules to apply.
        #[serde(default)]
        ruleset: Ruleset,
    },
    /// The student's own tests pass and cover the targets.
    StudentTests {
        /// Files that must be covered.
        #[serde(default)]
        targets:   Vec<String>,
        /// Required percentage; the configured threshold when unset.
        #[serde(default)]
        threshold: Option<f64>,
        /// Also require every branch to be taken.
        #[serde(default)]
        branch:    bool,
    },
}

impl Check {
    /// Runs the check against `cx`.
    pub async fn run(&self, cx: &mut CaseContext) -> CaseResult {
        match self {
            Check::RequiredFiles { files } => {
                let files = if files.is_empty() {
                    cx.config().required_files.clone()
                } else {
                    files.clone()
                };
                cx.assert_required_files_present(&files)
            }
            Check::RequiredSymbols { file, names } => cx.assert_required_symbols(file, names),
            Check::NoLoops { file, loops } => cx.assert_no_loops(file, *loops),
            Check::NoConditionals { file } => cx.assert_no_conditionals(file),
            Check::Docstrings { file, scope } => cx.assert_docstrings_correct(file, *scope),
            Check::MatchCount {
                file,
                pattern,
                count,
                keep_comments,
            } => {
                if *keep_comments {
                    let unit = cx.source(file)?;
                    cx.assert_text_match_count(unit.code(), pattern, *count)
                } else {
                    cx.assert_match_count(file, pattern, *count)
                }
            }
            Check::ScriptOutput {
                script,
                input,
                input_file,
                args,
                variables,
                expected,
                expected_file,
                mode,
                differs,
            } => {
                let expected = match (expected_file, expected) {
                    (Some(name), _) => cx.submission().read_scaffolding(name)?,
                    (None, Some(text)) => text.clone(),
                    (None, None) => {
                        return Err(UsageError::Invalid(format!(
                            "script_output check of {script} needs `expected` or `expected_file`"
                        ))
                        .into());
                    }
                };
                let request = ScriptRequest::builder()
                    .script(script.clone())
                    .input(input.clone())
                    .maybe_input_file(input_file.clone())
                    .args(args.clone())
                    .variables(variables.clone())
                    .build();
                if *differs {
                    cx.assert_script_output_differs(&request, &expected, *mode).await
                } else {
                    cx.assert_script_output_equal(&request, &expected, *mode).await
                }
            }
            Check::Style { file, ruleset } => cx.assert_passes_style(file, *ruleset).await,
            Check::StudentTests {
                targets,
                threshold,
                branch,
            } => {
                let threshold = threshold.unwrap_or(cx.config().coverage_threshold);
                CoverageRunner::builder()
                    .threshold(threshold)
                    .targets(targets.iter().cloned())
                    .branch(*branch)
                    .build()
                    .check_student_tests(cx)
                    .await
            }
        }
    }
}

impl CaseSpec {
    /// Builds the runnable case.
    fn into_case(self) -> TestCase {
        let checks = Rc::new(self.checks);
        let note = self.note;

        let mut case = TestCase::new(self.name, move |cx| {
            let checks = Rc::clone(&checks);
            let note = note.clone();
            Box::pin(async move {
                for check in checks.iter() {
                    annotate(check.run(cx).await, note.as_deref())?;
                }
                CaseResult::Ok(())
            })
        })
        .weight(self.weight);

        if let Some(order) = self.order {
            case = case.order(order);
        }
        if self.required {
            case = case.required();
        }
        if let Some(description) = self.description {
            case = case.description(description);
        }
        for (file, names) in self.requires {
            case = case.requires(file, names);
        }
        case
    }
}

impl SuiteSpec {
    /// Parses a suite file's contents.
    pub fn from_json(text: &str) -> Result<Self> {
        let spec: SuiteSpec = serde_json::from_str(text).context("Could not parse suite file")?;
        let duplicates = spec.cases.iter().map(|c| c.name.as_str()).duplicates().join(", ");
        if !duplicates.is_empty() {
            bail!("Suite {} has duplicate case names: {duplicates}", spec.name);
        }
        Ok(spec)
    }

    /// Builds the runnable suite.
    pub fn into_suite(self) -> Suite {
        let mut suite = Suite::new(self.name);
        for case in self.cases {
            suite.add(case.into_case());
        }
        suite
    }
}

/// Reads and builds the suite at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Suite> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read suite file {}", path.display()))?;
    let spec = SuiteSpec::from_json(&text)
        .with_context(|| format!("Invalid suite file {}", path.display()))?;
    debug!(suite = %spec.name, cases = spec.cases.len(), "loaded suite file");
    Ok(spec.into_suite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_are_tagged_by_kind() {
        let spec = SuiteSpec::from_json(
            r#"{
                "name": "demo",
                "cases": [
                    { "name": "a", "order": 2,
                      "checks": [{ "kind": "no_loops", "file": "x.py", "loops": "while" }] },
                    { "name": "b",
                      "checks": [{ "kind": "match_count", "file": "x.py", "pattern": "print",
                                   "count": { "type": "at_most", "value": 1 } }] }
                ]
            }"#,
        )
        .expect("parse");

        assert!(matches!(
            spec.cases[0].checks[0],
            Check::NoLoops {
                loops: LoopKind::While,
                ..
            }
        ));
        assert!(matches!(
            spec.cases[1].checks[0],
            Check::MatchCount {
                count: CountPredicate::AtMost(1),
                ..
            }
        ));

        let suite = spec.into_suite();
        let names: Vec<_> = suite.ordered().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = SuiteSpec::from_json(r#"{"name": "d", "cases": [{"name": "x"}, {"name": "x"}]}"#)
            .expect_err("duplicates");
        assert!(err.to_string().contains("duplicate case names: x"));
    }

    #[test]
    fn expected_output_may_come_from_scaffolding() {
        let spec = SuiteSpec::from_json(
            r#"{
                "name": "files",
                "cases": [
                    { "name": "a",
                      "checks": [{ "kind": "script_output", "script": "hello.py",
                                   "input_file": "in.txt", "expected_file": "out.txt" }] },
                    { "name": "b",
                      "checks": [{ "kind": "student_tests", "branch": true }] }
                ]
            }"#,
        )
        .expect("parse");

        assert!(matches!(
            &spec.cases[0].checks[0],
            Check::ScriptOutput { expected: None, expected_file: Some(name), .. } if name == "out.txt"
        ));
        assert!(matches!(
            spec.cases[1].checks[0],
            Check::StudentTests { branch: true, .. }
        ));
    }

    #[tokio::test]
    async fn script_output_without_expectation_is_a_usage_error() {
        let dir = std::env::temp_dir().join(format!("gradekit-suite-file-{}", uuid::Uuid::new_v4()));
        let mut cx = CaseContext::with_submission(
            crate::config::GraderConfig::with_base(&dir),
            crate::submission::Submission::new(&dir, &dir),
        );
        let check = Check::ScriptOutput {
            script:        "hello.py".into(),
            input:         Vec::new(),
            input_file:    None,
            args:          Vec::new(),
            variables:     BTreeMap::new(),
            expected:      None,
            expected_file: None,
            mode:          MatchMode::default(),
            differs:       false,
        };
        let err = check.run(&mut cx).await.expect_err("no expectation");
        assert!(matches!(err, crate::error::GradeError::Usage(_)));
    }

    #[test]
    fn unknown_checks_are_rejected() {
        assert!(
            SuiteSpec::from_json(r#"{"name": "d", "cases": [{"name": "x", "checks": [{"kind": "nope"}]}]}"#)
                .is_err()
        );
    }
}
