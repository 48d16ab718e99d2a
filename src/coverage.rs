#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Line coverage of the student's files, collected with coverage.py.
//!
//! While a [`CoverageSession`] is installed in the script runner every
//! script runs under `python -m coverage run --parallel-mode`, measuring the
//! whole submission root. Afterwards the data files are combined, exported as
//! JSON for the measured files and turned into one [`CoverageResult`] per
//! file. A measured file that never ran counts as 0% over its statements.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use bon::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};
use tracing::{info, warn};

use crate::{
    error::{AssertionFailure, CaseResult, InfrastructureError},
    inspect::parser::Parser,
    process::{Collected, ProcessError, StdinSource, run_collect},
    report::Report,
    runner::{
        context::{Assertable, CaseContext},
        suite::Suite,
    },
    util::find_files,
};

/// Hit/not-hit per executable line, and per branch when measured, of one
/// file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageResult {
    /// Executable line number to whether it ran.
    lines:    BTreeMap<usize, bool>,
    /// Branch arc (source line, destination line) to whether it was taken.
    /// Negative destinations are exits from a function or module.
    branches: BTreeMap<(i64, i64), bool>,
}

impl CoverageResult {
    /// Builds a result from executed and missing line numbers.
    pub fn from_lines(
        executed: impl IntoIterator<Item = usize>,
        missing: impl IntoIterator<Item = usize>,
    ) -> Self {
        let mut lines = BTreeMap::new();
        for line in missing {
            lines.insert(line, false);
        }
        for line in executed {
            lines.insert(line, true);
        }
        Self {
            lines,
            branches: BTreeMap::new(),
        }
    }

    /// A file that never ran: every statement of `path` is missing. A file
    /// that cannot be read counts as one missing line.
    pub fn unexecuted(path: &Path) -> Self {
        let statements = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(Parser::new)
            .map(|parser| parser.statement_lines());
        match statements {
            Ok(lines) => Self::from_lines(Vec::<usize>::new(), lines),
            Err(e) => {
                warn!("Could not read {}: {e:#}", path.display());
                Self::from_lines(Vec::<usize>::new(), [1_usize])
            }
        }
    }

    /// Adds taken and missed branch arcs.
    pub fn with_branches(
        mut self,
        executed: impl IntoIterator<Item = (i64, i64)>,
        missing: impl IntoIterator<Item = (i64, i64)>,
    ) -> Self {
        for arc in missing {
            self.branches.insert(arc, false);
        }
        for arc in executed {
            self.branches.insert(arc, true);
        }
        self
    }

    /// Number of executed lines.
    pub fn hits(&self) -> usize {
        self.lines.values().filter(|hit| **hit).count()
    }

    /// Number of executable lines.
    pub fn total(&self) -> usize {
        self.lines.len()
    }

    /// Number of taken branches.
    pub fn branch_hits(&self) -> usize {
        self.branches.values().filter(|hit| **hit).count()
    }

    /// Number of measured branches.
    pub fn branch_total(&self) -> usize {
        self.branches.len()
    }

    /// Lines with some branches taken and others not.
    pub fn partial_branches(&self) -> usize {
        self.branches
            .iter()
            .into_group_map_by(|((from, _), _)| *from)
            .into_values()
            .filter(|arcs| arcs.iter().any(|(_, hit)| **hit) && arcs.iter().any(|(_, hit)| !**hit))
            .count()
    }

    /// Percentage of lines and branches covered; 100 when nothing is
    /// executable.
    pub fn percent(&self) -> f64 {
        percent(
            self.hits() + self.branch_hits(),
            self.total() + self.branch_total(),
        )
    }

    /// Executable lines that never ran, ascending.
    pub fn missing_lines(&self) -> Vec<usize> {
        self.lines
            .iter()
            .filter(|(_, hit)| !**hit)
            .map(|(line, _)| *line)
            .collect()
    }
}

/// `hits / total` as a percentage.
fn percent(hits: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        hits as f64 * 100.0 / total as f64
    }
}

/// Coverage of every measured file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    /// File name, relative to the submission root, to its coverage.
    pub files: BTreeMap<String, CoverageResult>,
}

/// The parts of coverage.py's JSON report that are read.
#[derive(Debug, Deserialize)]
struct JsonReport {
    /// Per-file entries.
    #[serde(default)]
    files: BTreeMap<String, JsonFile>,
}

/// One file of coverage.py's JSON report.
#[derive(Debug, Deserialize)]
struct JsonFile {
    /// Lines that ran.
    #[serde(default)]
    executed_lines:    Vec<usize>,
    /// Executable lines that did not run.
    #[serde(default)]
    missing_lines:     Vec<usize>,
    /// Branch arcs taken, present with `--branch`.
    #[serde(default)]
    executed_branches: Vec<(i64, i64)>,
    /// Branch arcs never taken, present with `--branch`.
    #[serde(default)]
    missing_branches:  Vec<(i64, i64)>,
}

impl CoverageSummary {
    /// Parses the output of `coverage json`.
    pub fn from_json(text: &str) -> Result<Self> {
        let report: JsonReport =
            serde_json::from_str(text).context("Could not parse coverage JSON report")?;
        Ok(Self {
            files: report
                .files
                .into_iter()
                .map(|(name, file)| {
                    (
                        name,
                        CoverageResult::from_lines(file.executed_lines, file.missing_lines)
                            .with_branches(file.executed_branches, file.missing_branches),
                    )
                })
                .collect(),
        })
    }

    /// Executed lines across all files.
    pub fn hits(&self) -> usize {
        self.files.values().map(CoverageResult::hits).sum()
    }

    /// Executable lines across all files.
    pub fn total(&self) -> usize {
        self.files.values().map(CoverageResult::total).sum()
    }

    /// Aggregate percentage over lines and branches; 100 when nothing is
    /// executable.
    pub fn percent(&self) -> f64 {
        let branch_hits: usize = self.files.values().map(CoverageResult::branch_hits).sum();
        let branch_total: usize = self.files.values().map(CoverageResult::branch_total).sum();
        percent(self.hits() + branch_hits, self.total() + branch_total)
    }
}

/// Collapses sorted line numbers into ranges, e.g. `3-5, 9`.
pub fn line_ranges(lines: &[usize]) -> String {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == line => *end = line,
            _ => ranges.push((line, line)),
        }
    }
    ranges
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .join(", ")
}

/// A temporary data directory and the files whose coverage is measured.
#[derive(Debug, Clone)]
pub struct CoverageSession {
    /// Directory holding data files and the JSON export.
    dir:       PathBuf,
    /// Base name of the parallel data files.
    data_file: PathBuf,
    /// Measured files, relative to the submission root.
    include:   Vec<String>,
    /// Measure branches as well as lines.
    branch:    bool,
}

impl CoverageSession {
    /// Creates a session measuring `targets`; every Python file directly
    /// under the submission root when empty.
    pub fn new<I, S>(targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = std::env::temp_dir().join(format!("gradekit-coverage-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
        Ok(Self {
            data_file: dir.join(".coverage"),
            dir,
            include: targets.into_iter().map(Into::into).collect(),
            branch: false,
        })
    }

    /// Also measures branches.
    pub fn with_branch(mut self, branch: bool) -> Self {
        self.branch = branch;
        self
    }

    /// Measured files.
    pub fn targets(&self) -> &[String] {
        &self.include
    }

    /// Interpreter arguments that precede the script path.
    ///
    /// The whole root is the measured source, so files that never run are
    /// still recorded; the export narrows the report to the targets.
    pub fn run_args(&self, root: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-m".into(),
            "coverage".into(),
            "run".into(),
            "--parallel-mode".into(),
            format!("--source={}", root.display()).into(),
        ];
        if self.branch {
            args.push("--branch".into());
        }
        args
    }

    /// Environment variable pointing coverage.py at this session's data.
    pub fn env(&self) -> (OsString, OsString) {
        ("COVERAGE_FILE".into(), self.data_file.clone().into_os_string())
    }

    /// True when at least one run wrote data.
    fn has_data(&self) -> bool {
        std::fs::read_dir(&self.dir).is_ok_and(|entries| {
            entries.flatten().any(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".coverage.")
            })
        })
    }

    /// Files that must appear in the summary, relative to `root`.
    fn expected_files(&self, root: &Path) -> Vec<String> {
        if !self.include.is_empty() {
            return self.include.clone();
        }
        match find_files("py", 0, root) {
            Ok(files) => files
                .iter()
                .map(|path| relative_name(root, &path.display().to_string()))
                .collect(),
            Err(e) => {
                warn!("Could not list files under {}: {e:#}", root.display());
                Vec::new()
            }
        }
    }

    /// Runs one coverage.py subcommand with this session's data file.
    async fn coverage_command(
        &self,
        python: &Path,
        cwd: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<Collected, InfrastructureError> {
        let mut full: Vec<OsString> = vec!["-m".into(), "coverage".into()];
        full.extend(args.iter().map(OsString::from));
        run_collect(
            python,
            &full,
            StdinSource::Null,
            Some(cwd),
            &[self.env()],
            Some(timeout),
        )
        .await
        .map_err(|e| tool_error(e, "coverage"))
    }

    /// Exports the combined data for the measured files as JSON and reads it
    /// back.
    async fn export(
        &self,
        python: &Path,
        root: &Path,
        timeout: Duration,
    ) -> Result<CoverageSummary, InfrastructureError> {
        let json = self.dir.join("coverage.json");
        let mut args = vec!["json".to_string(), "-o".to_string(), json.display().to_string()];
        if !self.include.is_empty() {
            let include = self
                .include
                .iter()
                .map(|t| root.join(t).display().to_string())
                .join(",");
            args.push(format!("--include={include}"));
        }

        let collected = self.coverage_command(python, root, &args, timeout).await?;
        if !collected.status.success() {
            let stdout = collected.stdout_text();
            let stderr = collected.stderr_text();
            if stdout.contains("No data to report") || stderr.contains("No data to report") {
                return Ok(CoverageSummary::default());
            }
            return Err(command_failed(&stderr));
        }

        let text = std::fs::read_to_string(&json).map_err(|source| InfrastructureError::Io {
            path: json.clone(),
            source,
        })?;
        Ok(CoverageSummary::from_json(&text)?)
    }

    /// Combines the data written so far and reads it back. Measured files
    /// missing from the data count as never run.
    pub async fn collect(
        &self,
        python: &Path,
        root: &Path,
        timeout: Duration,
    ) -> Result<CoverageSummary, InfrastructureError> {
        let measured = if self.has_data() {
            let combined = self
                .coverage_command(python, root, &["combine".to_string()], timeout)
                .await?;
            if !combined.status.success() {
                return Err(command_failed(&combined.stderr_text()));
            }
            self.export(python, root, timeout).await?
        } else {
            warn!("No coverage data was recorded");
            CoverageSummary::default()
        };

        let mut summary = CoverageSummary {
            files: measured
                .files
                .into_iter()
                .map(|(name, result)| (relative_name(root, &name), result))
                .collect(),
        };
        for target in self.expected_files(root) {
            if !summary.files.contains_key(&target) {
                warn!("{target} never ran under coverage");
                let result = CoverageResult::unexecuted(&root.join(&target));
                summary.files.insert(target, result);
            }
        }
        Ok(summary)
    }

    /// Removes the data directory.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Names a reported file relative to `root` when it lies inside it.
fn relative_name(root: &Path, name: &str) -> String {
    Path::new(name)
        .strip_prefix(root)
        .map_or_else(|_| name.to_string(), |rel| rel.display().to_string())
}

/// A coverage.py subcommand that exited unsuccessfully.
fn command_failed(stderr: &str) -> InfrastructureError {
    InfrastructureError::ToolUnavailable {
        tool:   "coverage".into(),
        reason: stderr.trim().to_string(),
    }
}

/// Maps a process failure of `tool` to an infrastructure error.
fn tool_error(err: ProcessError, tool: &str) -> InfrastructureError {
    match err {
        ProcessError::Spawn { source, .. } => InfrastructureError::ToolUnavailable {
            tool:   tool.to_string(),
            reason: source.to_string(),
        },
        ProcessError::TimedOut(after) => InfrastructureError::Timeout {
            tool: tool.to_string(),
            after,
        },
        ProcessError::Io(e) => InfrastructureError::Other(e),
    }
}

/// One row of the per-file coverage table.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct FileCoverage {
    /// File name.
    #[tabled(rename = "File")]
    pub file:    String,
    /// Executed lines.
    #[tabled(rename = "Hit")]
    pub hits:    usize,
    /// Executable lines.
    #[tabled(rename = "Lines")]
    pub total:   usize,
    /// Percentage, formatted.
    #[tabled(rename = "Cover")]
    pub percent: String,
    /// Lines with branches only partly taken.
    #[tabled(rename = "Partial")]
    pub partial: usize,
    /// Lines that never ran, as ranges.
    #[tabled(rename = "Missing")]
    pub missing: String,
}

/// Coverage part of a report.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageSection {
    /// Aggregate percentage.
    pub percent:   f64,
    /// Required percentage.
    pub threshold: f64,
    /// Whether `percent` meets `threshold`.
    pub passed:    bool,
    /// Per-file breakdown.
    pub files:     Vec<FileCoverage>,
    /// Why coverage could not be collected.
    pub error:     Option<String>,
}

impl CoverageSection {
    /// Compares `summary` against `threshold`.
    pub fn from_summary(summary: &CoverageSummary, threshold: f64) -> Self {
        let percent = summary.percent();
        Self {
            percent,
            threshold,
            passed: meets(percent, threshold),
            files: summary
                .files
                .iter()
                .map(|(file, result)| FileCoverage {
                    file:    file.clone(),
                    hits:    result.hits(),
                    total:   result.total(),
                    percent: format!("{:.0}%", result.percent()),
                    partial: result.partial_branches(),
                    missing: line_ranges(&result.missing_lines()),
                })
                .collect(),
            error: None,
        }
    }

    /// A failing section for coverage that could not be collected.
    pub fn unavailable(reason: impl Into<String>, threshold: f64) -> Self {
        Self {
            percent: 0.0,
            threshold,
            passed: false,
            files: Vec::new(),
            error: Some(reason.into()),
        }
    }

    /// Summary line, plus the per-file table when details are requested and
    /// the threshold was missed.
    pub fn render(&self, show_details: bool) -> String {
        if let Some(error) = &self.error {
            return format!("Coverage could not be collected: {error}\n");
        }

        let mut out = format!(
            "Coverage: {:.2}% (threshold {:.2}%)\n",
            self.percent, self.threshold
        );
        if show_details && !self.passed && !self.files.is_empty() {
            let table = Table::new(&self.files)
                .with(Panel::header("Coverage by file"))
                .with(Modify::new(Rows::new(1..)).with(Width::wrap(24).keep_words(true)))
                .with(
                    Modify::new(Rows::first())
                        .with(Alignment::center())
                        .with(Alignment::center_vertical()),
                )
                .with(Style::modern())
                .to_string();
            out.push_str(&table);
            out.push('\n');
        }
        out
    }
}

/// True when `percent` reaches `threshold`, ignoring rounding noise.
fn meets(percent: f64, threshold: f64) -> bool {
    percent + 1e-9 >= threshold
}

/// Runs suites and student tests while measuring line coverage.
#[derive(Debug, Clone, Builder)]
pub struct CoverageRunner {
    /// Required aggregate percentage.
    #[builder(default = 100.0)]
    threshold: f64,
    /// Measured files, relative to the submission root.
    #[builder(default, with = |targets: impl IntoIterator<Item = impl Into<String>>| {
        targets.into_iter().map(Into::into).collect::<Vec<String>>()
    })]
    targets:   Vec<String>,
    /// Measure branches as well as lines.
    #[builder(default)]
    branch:    bool,
}

impl CoverageRunner {
    /// A runner measuring `targets` against `threshold`.
    pub fn new<I, S>(threshold: f64, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder().threshold(threshold).targets(targets).build()
    }

    /// Required aggregate percentage.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A fresh session over this runner's targets.
    fn session(&self) -> Result<CoverageSession> {
        Ok(CoverageSession::new(self.targets.iter().cloned())?.with_branch(self.branch))
    }

    /// Runs `suite` with coverage installed and attaches the result.
    pub async fn run(&self, suite: &Suite, mut cx: CaseContext) -> Report {
        let interpreter = cx.scripts().interpreter();
        let root = cx.submission().root().to_path_buf();
        let timeout = cx.config().script_timeout();

        let session = match self.session() {
            Ok(session) => session,
            Err(e) => {
                warn!("Running without coverage: {e:#}");
                let mut report = suite.run(cx).await;
                report.attach_coverage(CoverageSection::unavailable(
                    format!("{e:#}"),
                    self.threshold,
                ));
                return report;
            }
        };
        cx.scripts_mut().set_coverage(Some(session.clone()));

        let mut report = suite.run(cx).await;
        let section = match interpreter {
            Ok(python) => match session.collect(&python, &root, timeout).await {
                Ok(summary) => {
                    info!("Coverage: {:.2}%", summary.percent());
                    CoverageSection::from_summary(&summary, self.threshold)
                }
                Err(e) => {
                    warn!("{e}");
                    CoverageSection::unavailable(e.to_string(), self.threshold)
                }
            },
            Err(e) => CoverageSection::unavailable(e.to_string(), self.threshold),
        };
        session.cleanup();
        report.attach_coverage(section);
        report
    }

    /// Runs the student's own unit tests under coverage, as a case body.
    ///
    /// Fails when any student test fails or errors, or when the measured
    /// files fall short of the threshold.
    pub async fn check_student_tests(&self, cx: &mut CaseContext) -> CaseResult {
        let python = cx.scripts().interpreter()?;
        let root = cx.submission().root().to_path_buf();
        let tests_dir = cx.config().source_path(&cx.config().student_tests_dir);
        let timeout = cx.config().script_timeout();
        let show_details = cx.config().show_details || cx.config().show_trace;

        let session = self.session().map_err(InfrastructureError::Other)?;
        let mut args = session.run_args(&root);
        args.extend(
            ["-m", "unittest", "discover", "-s"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(tests_dir.into_os_string());

        let env: Vec<(OsString, OsString)> = vec![
            ("PYTHONPATH".into(), root.as_os_str().to_os_string()),
            session.env(),
        ];
        let result = run_collect(
            &python,
            &args,
            StdinSource::Null,
            Some(&root),
            &env,
            Some(timeout),
        )
        .await;

        let collected = match result {
            Ok(collected) => collected,
            Err(ProcessError::TimedOut(after)) => {
                session.cleanup();
                return Err(AssertionFailure::new(format!(
                    "Your tests did not finish within {after:?}."
                ))
                .into());
            }
            Err(e) => {
                session.cleanup();
                return Err(tool_error(e, "python").into());
            }
        };

        if !collected.status.success() {
            session.cleanup();
            let mut message = "It looks like your submission is not passing your own tests:".to_string();
            if show_details {
                message.push('\n');
                message.push_str(collected.stderr_text().trim_end());
            }
            return Err(AssertionFailure::new(message).into());
        }
        cx.note("Submission passes student tests.");

        let collected = session.collect(&python, &root, timeout).await;
        session.cleanup();
        let section = CoverageSection::from_summary(&collected?, self.threshold);

        if !section.passed {
            let mut message = format!("Test coverage is less than {:.0}%.", self.threshold);
            if show_details {
                message.push('\n');
                message.push_str(section.render(true).trim_end());
            }
            return Err(AssertionFailure::new(message).into());
        }

        let files = if self.targets.is_empty() {
            section.files.iter().map(|f| f.file.clone()).join(", ")
        } else {
            self.targets.join(", ")
        };
        let kind = if self.branch {
            "statement and branch"
        } else {
            "statement"
        };
        cx.note(format!("{:.0}% {kind} coverage of: {files}", section.percent));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eighty_of_one_hundred_lines() {
        let result = CoverageResult::from_lines(1..=80, 81..=100);
        assert_eq!(result.hits(), 80);
        assert_eq!(result.total(), 100);
        assert!((result.percent() - 80.0).abs() < 1e-9);

        let mut summary = CoverageSummary::default();
        summary.files.insert("hello.py".into(), result);
        assert!(!CoverageSection::from_summary(&summary, 100.0).passed);
        assert!(CoverageSection::from_summary(&summary, 75.0).passed);
    }

    #[test]
    fn nothing_executable_is_fully_covered() {
        assert_eq!(CoverageResult::default().percent(), 100.0);
        assert_eq!(CoverageSummary::default().percent(), 100.0);
    }

    #[test]
    fn parses_coverage_json() {
        let text = r#"{
            "meta": {"version": "7.4.0"},
            "files": {
                "hello.py": {
                    "executed_lines": [1, 2, 4],
                    "missing_lines": [5, 6, 7, 10],
                    "summary": {"percent_covered": 42.8}
                }
            },
            "totals": {}
        }"#;
        let summary = CoverageSummary::from_json(text).expect("parse");
        let hello = &summary.files["hello.py"];
        assert_eq!(hello.hits(), 3);
        assert_eq!(hello.total(), 7);
        assert_eq!(line_ranges(&hello.missing_lines()), "5-7, 10");
    }

    #[test]
    fn run_args_measure_the_whole_root() {
        let session = CoverageSession::new(["hello.py"]).expect("session");
        let args = session.run_args(Path::new("/sub"));
        assert_eq!(args[3], OsString::from("--parallel-mode"));
        assert_eq!(args[4], OsString::from("--source=/sub"));
        assert_eq!(args.len(), 5);
        assert_eq!(session.env().0, OsString::from("COVERAGE_FILE"));

        let branched = session.clone().with_branch(true);
        assert_eq!(branched.run_args(Path::new("/sub")).last(), Some(&OsString::from("--branch")));
        session.cleanup();
    }

    #[test]
    fn branches_count_toward_the_percentage() {
        let text = r#"{
            "files": {
                "hello.py": {
                    "executed_lines": [1, 2, 3],
                    "missing_lines": [4],
                    "executed_branches": [[2, 3], [5, -1]],
                    "missing_branches": [[2, 4], [5, 6]]
                }
            }
        }"#;
        let summary = CoverageSummary::from_json(text).expect("parse");
        let hello = &summary.files["hello.py"];
        assert_eq!(hello.branch_hits(), 2);
        assert_eq!(hello.branch_total(), 4);
        assert_eq!(hello.partial_branches(), 2);
        assert!((summary.percent() - 62.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn targets_that_never_ran_count_as_uncovered() {
        let root = std::env::temp_dir().join(format!("gradekit-cov-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("mkdir");
        std::fs::write(root.join("hello.py"), "\"\"\"Greeter.\"\"\"\nname = input()\nprint(name)\n")
            .expect("write");

        let session = CoverageSession::new(["hello.py"]).expect("session");
        // no run wrote data, so no interpreter is started
        let summary = session
            .collect(Path::new("python3"), &root, Duration::from_secs(5))
            .await
            .expect("collect");
        session.cleanup();

        let hello = &summary.files["hello.py"];
        assert_eq!((hello.hits(), hello.total()), (0, 2));
        assert_eq!(summary.percent(), 0.0);
        assert!(!CoverageSection::from_summary(&summary, 100.0).passed);
        let _ = std::fs::remove_dir_all(&root);
    }
}
