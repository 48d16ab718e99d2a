#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The capability set handed to every test case body.
//!
//! [`CaseContext`] owns the per-run collaborators: the I/O channel, the
//! source inspector cache, the script runner and the style checker.
//! [`Assertable`] is the grading vocabulary built on top of them.

use std::sync::Arc;

use itertools::Itertools;

use super::compare::{MatchMode, mismatch_message, output_matches, unexpected_match_message};
use crate::{
    config::GraderConfig,
    error::{AssertionFailure, CaseResult, GradeError},
    inspect::{
        ConstructKind, DocstringScope, InspectError, LoopKind, ReportMode, SourceInspector,
        SourceUnit,
    },
    io_channel::IoChannel,
    pattern::{CountPredicate, MatchSpec},
    script::{ExitIndicator, ScriptOutcome, ScriptRequest, ScriptRunner},
    style::{Ruleset, StyleChecker, StyleReport},
    submission::Submission,
    types::{LineRef, Violation, ViolationKind},
};

/// Everything a case body may use. Consumed by one suite run.
#[derive(Debug)]
pub struct CaseContext {
    /// Settings for this run.
    config:     GraderConfig,
    /// Where the student's files live.
    submission: Submission,
    /// Slot scripts take while running.
    channel:    IoChannel,
    /// Per-run source cache.
    inspector:  SourceInspector,
    /// Student script execution.
    scripts:    ScriptRunner,
    /// Style checks.
    style:      StyleChecker,
    /// Notes written by the current case.
    notes:      Vec<String>,
}

impl CaseContext {
    /// Builds a context from `config`.
    pub fn new(config: GraderConfig) -> Self {
        let submission = Submission::from_config(&config);
        Self::with_submission(config, submission)
    }

    /// Builds a context for an explicit submission.
    pub fn with_submission(config: GraderConfig, submission: Submission) -> Self {
        let style = StyleChecker::builder()
            .program(config.flake8.clone())
            .maybe_full_config(config.style_config.as_ref().map(|p| config.source_path(p)))
            .maybe_docstring_config(config.docstring_config.as_ref().map(|p| config.source_path(p)))
            .timeout(config.style_timeout())
            .build();
        let scripts = ScriptRunner::new(
            submission.clone(),
            config.python.clone(),
            config.script_timeout(),
        );

        Self {
            config,
            submission,
            channel: IoChannel::default(),
            inspector: SourceInspector::new(),
            scripts,
            style,
            notes: Vec::new(),
        }
    }

    /// Replaces the style checker.
    pub fn with_style_checker(mut self, style: StyleChecker) -> Self {
        self.style = style;
        self
    }

    /// Settings for this run.
    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// The I/O channel scripts run on.
    pub fn channel(&self) -> &IoChannel {
        &self.channel
    }

    /// Script runner.
    pub fn scripts(&self) -> &ScriptRunner {
        &self.scripts
    }

    /// Script runner, for installing a coverage session.
    pub fn scripts_mut(&mut self) -> &mut ScriptRunner {
        &mut self.scripts
    }

    /// The source cache.
    pub fn inspector(&self) -> &SourceInspector {
        &self.inspector
    }

    /// Removes and returns the notes written since the last call.
    pub(crate) fn take_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notes)
    }
}

/// Joins a failure message with an instructor-supplied note.
fn with_note(message: String, note: Option<&str>) -> String {
    match note {
        Some(extra) => format!("{message}\n{extra}"),
        None => message,
    }
}

/// The assertion vocabulary available to case bodies.
///
/// Each assertion returns `Ok(())` when it holds, an assertion failure when
/// the submission is at fault, and another [`GradeError`] when the check
/// itself could not be carried out.
#[allow(async_fn_in_trait)]
pub trait Assertable {
    /// Where the student's files live.
    fn submission(&self) -> &Submission;

    /// Loads a submitted file through the run's cache.
    fn source(&mut self, file: &str) -> CaseResult<Arc<SourceUnit>>;

    /// Adds a line of per-case output to the report.
    fn note(&mut self, text: impl Into<String>);

    /// Runs a student script with scripted input.
    async fn run_script(&mut self, request: &ScriptRequest) -> CaseResult<ScriptOutcome>;

    /// Runs the style checker on a submitted file.
    async fn check_style(&mut self, file: &str, ruleset: Ruleset) -> CaseResult<StyleReport>;

    /// Fails when `file` contains a loop of the given kind.
    fn assert_no_loops(&mut self, file: &str, kind: LoopKind) -> CaseResult {
        let unit = self.source(file)?;
        let found = unit.loops(kind);
        if found.is_empty() {
            return Ok(());
        }

        let what = match kind {
            LoopKind::For => "for loop",
            LoopKind::While => "while loop",
            LoopKind::Any => "loop",
        };
        let violations = found
            .iter()
            .map(|c| {
                Violation::new(ViolationKind::LoopForbidden, c.kind.to_string())
                    .at(LineRef::new(unit.file_name(), c.line))
            })
            .collect();
        Err(AssertionFailure::with_violations(
            format!("It looks like the file {file} contains at least one {what}."),
            violations,
        )
        .into())
    }

    /// Fails when `file` branches anywhere other than the main-module guard.
    fn assert_no_conditionals(&mut self, file: &str) -> CaseResult {
        let unit = self.source(file)?;
        if !unit.has_conditional() {
            return Ok(());
        }

        let violations = unit
            .conditionals()
            .iter()
            .map(|c| {
                Violation::new(ViolationKind::ConditionalForbidden, c.kind.to_string())
                    .at(LineRef::new(unit.file_name(), c.line))
            })
            .collect();
        let only_ifs = unit
            .conditionals()
            .iter()
            .all(|c| c.kind == ConstructKind::If);
        let what = if only_ifs { "if statement" } else { "conditional" };
        Err(AssertionFailure::with_violations(
            format!("It looks like the file {file} contains at least one {what}."),
            violations,
        )
        .into())
    }

    /// Fails naming every declaration in `scope` without a docstring.
    fn assert_docstrings_correct(&mut self, file: &str, scope: DocstringScope) -> CaseResult {
        let unit = self.source(file)?;
        let missing = unit.missing_docstrings(scope, ReportMode::All);
        if missing.is_empty() {
            self.note("Submission passes all docstring checks!");
            return Ok(());
        }

        let violations = missing
            .iter()
            .map(|m| {
                Violation::new(
                    ViolationKind::MissingDocstring,
                    format!("Missing docstring for {}", m.symbol),
                )
                .at(LineRef::new(unit.file_name(), m.line))
            })
            .collect();
        Err(AssertionFailure::with_violations(
            format!("Submission does not pass docstring checks: {file}"),
            violations,
        )
        .into())
    }

    /// Fails naming exactly the paths that were not submitted.
    fn assert_required_files_present<I, S>(&mut self, paths: I) -> CaseResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let missing = self.submission().missing_files(paths);
        for path in &missing {
            self.note(format!("Missing {path}"));
        }
        if missing.is_empty() {
            self.note("All required files submitted!");
            return Ok(());
        }

        let violations = missing
            .into_iter()
            .map(|p| Violation::new(ViolationKind::MissingRequiredFile, p))
            .collect();
        Err(AssertionFailure::with_violations("Missing some required files!", violations).into())
    }

    /// Fails naming the requested symbols that `file` does not define at
    /// module scope.
    fn assert_required_symbols<I, S>(&mut self, file: &str, names: I) -> CaseResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unit = self.source(file)?;
        let missing = unit.missing_symbols(names);
        if missing.is_empty() {
            return Ok(());
        }

        let message = format!(
            "Missing required definitions in {file}: {}",
            missing.iter().join(", ")
        );
        let violations = missing
            .into_iter()
            .map(|name| Violation::new(ViolationKind::MissingSymbol, name))
            .collect();
        Err(AssertionFailure::with_violations(message, violations).into())
    }

    /// Fails when `actual` does not satisfy `expected` under `mode`.
    fn assert_output_correct(&mut self, actual: &str, expected: &str, mode: MatchMode) -> CaseResult {
        if output_matches(actual, expected, mode)? {
            return Ok(());
        }
        Err(AssertionFailure::with_violations(
            mismatch_message(actual, expected, mode),
            vec![Violation::new(ViolationKind::OutputMismatch, format!("{mode:?}").to_lowercase())],
        )
        .into())
    }

    /// Fails when `actual` satisfies `unexpected` under `mode`.
    fn assert_output_differs(&mut self, actual: &str, unexpected: &str, mode: MatchMode) -> CaseResult {
        if !output_matches(actual, unexpected, mode)? {
            return Ok(());
        }
        Err(AssertionFailure::with_violations(
            unexpected_match_message(actual, unexpected, mode),
            vec![Violation::new(ViolationKind::OutputMismatch, format!("{mode:?}").to_lowercase())],
        )
        .into())
    }

    /// Runs the script and fails unless it finishes cleanly with matching
    /// output.
    async fn assert_script_output_equal(
        &mut self,
        request: &ScriptRequest,
        expected: &str,
        mode: MatchMode,
    ) -> CaseResult {
        let outcome = self.run_script(request).await?;
        let context = outcome.describe(request.args());

        if outcome.exit == ExitIndicator::TimedOut || !outcome.stderr.trim().is_empty() {
            return Err(AssertionFailure::new(context).into());
        }
        if !output_matches(&outcome.stdout, expected, mode)? {
            return Err(AssertionFailure::with_violations(
                format!("{}\n{}", mismatch_message(&outcome.stdout, expected, mode), context),
                vec![Violation::new(ViolationKind::OutputMismatch, request.script())],
            )
            .into());
        }

        self.note(format!("Correct output:\n{expected}"));
        Ok(())
    }

    /// Runs the script and fails when its output satisfies `unexpected`.
    async fn assert_script_output_differs(
        &mut self,
        request: &ScriptRequest,
        unexpected: &str,
        mode: MatchMode,
    ) -> CaseResult {
        let outcome = self.run_script(request).await?;
        let context = outcome.describe(request.args());

        if outcome.exit == ExitIndicator::TimedOut || !outcome.stderr.trim().is_empty() {
            return Err(AssertionFailure::new(context).into());
        }
        if output_matches(&outcome.stdout, unexpected, mode)? {
            return Err(AssertionFailure::with_violations(
                format!(
                    "{}\n{}",
                    unexpected_match_message(&outcome.stdout, unexpected, mode),
                    context
                ),
                vec![Violation::new(ViolationKind::OutputMismatch, request.script())],
            )
            .into());
        }
        Ok(())
    }

    /// Counts `pattern` in `file` with comments and docstrings removed.
    fn assert_match_count(
        &mut self,
        file: &str,
        pattern: &str,
        predicate: CountPredicate,
    ) -> CaseResult {
        let unit = self.source(file)?;
        let spec = MatchSpec::new(pattern, predicate)?;
        let (found, ok) = spec.check(unit.stripped());
        if ok {
            return Ok(());
        }
        Err(AssertionFailure::with_violations(
            format!("Expected {predicate} matches of `{pattern}` in {file}, found {found}."),
            vec![Violation::new(ViolationKind::PatternCount, format!("{found}"))],
        )
        .into())
    }

    /// Counts `pattern` in arbitrary text.
    fn assert_text_match_count(
        &mut self,
        text: &str,
        pattern: &str,
        predicate: CountPredicate,
    ) -> CaseResult {
        let spec = MatchSpec::new(pattern, predicate)?;
        let (found, ok) = spec.check(text);
        if ok {
            return Ok(());
        }
        Err(AssertionFailure::with_violations(
            format!("Expected {predicate} matches of `{pattern}`, found {found}."),
            vec![Violation::new(ViolationKind::PatternCount, format!("{found}"))],
        )
        .into())
    }

    /// Fails when the style checker reports anything.
    async fn assert_passes_style(&mut self, file: &str, ruleset: Ruleset) -> CaseResult {
        let report = self.check_style(file, ruleset).await?;
        let (failed, passed) = match ruleset {
            Ruleset::Full => (
                "Submission does not pass pep8 checks:",
                "Submission passes all formatting checks!",
            ),
            Ruleset::DocstringOnly => (
                "Submission does not pass docstring checks:",
                "Submission passes all docstring checks!",
            ),
        };

        if report.clean() {
            self.note(passed);
            return Ok(());
        }
        Err(AssertionFailure {
            message:    format!("{failed}\n{}", report.output.trim_end()),
            violations: report.violations,
        }
        .into())
    }
}

impl Assertable for CaseContext {
    fn submission(&self) -> &Submission {
        &self.submission
    }

    fn source(&mut self, file: &str) -> CaseResult<Arc<SourceUnit>> {
        let path = self.submission.path(file);
        self.inspector.load(&path).map_err(|err| match err {
            // students see the name they submitted, not the grader's path
            InspectError::NotFound(_) => InspectError::NotFound(file.into()).into(),
            other => other.into(),
        })
    }

    fn note(&mut self, text: impl Into<String>) {
        self.notes.push(text.into());
    }

    async fn run_script(&mut self, request: &ScriptRequest) -> CaseResult<ScriptOutcome> {
        self.scripts.run(&self.channel, request).await
    }

    async fn check_style(&mut self, file: &str, ruleset: Ruleset) -> CaseResult<StyleReport> {
        let path = self.submission.path(file);
        Ok(self.style.check(&path, ruleset).await?)
    }
}

/// Appends an instructor note to an assertion failure.
pub fn annotate(result: CaseResult, note: Option<&str>) -> CaseResult {
    result.map_err(|err| match err {
        GradeError::Assertion(mut failure) => {
            failure.message = with_note(failure.message, note);
            GradeError::Assertion(failure)
        }
        other => other,
    })
}
