//! Tests for coverage results and their effect on the report.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use gradekit::{
    Assertable, CaseContext, CoverageRunner, GraderConfig, Report, ReportOptions, Suite, TestCase,
    coverage::{CoverageResult, CoverageSection, CoverageSummary, line_ranges},
    report::CaseReport,
    runner::{MatchMode, Outcome},
    script::ScriptRequest,
    submission::Submission,
    util::python_path,
};

fn scratch_dir(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gradekit-cov-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    for (name, body) in files {
        std::fs::write(dir.join(name), body).expect("write scratch file");
    }
    dir
}

fn context(dir: &Path) -> CaseContext {
    CaseContext::with_submission(GraderConfig::with_base(dir), Submission::new(dir, dir))
}

fn has_coverage_module() -> bool {
    python_path(None).is_ok_and(|python| {
        std::process::Command::new(python)
            .args(["-c", "import coverage"])
            .status()
            .is_ok_and(|status| status.success())
    })
}

fn eighty_percent() -> CoverageSummary {
    let mut summary = CoverageSummary::default();
    summary
        .files
        .insert("hello.py".into(), CoverageResult::from_lines(1..=80, 81..=100));
    summary
}

fn passing_report() -> Report {
    let case = TestCase::sync("ok", |_| Ok(()));
    Report::new(
        "coverage",
        vec![CaseReport::new(&case, Outcome::Passed, vec![], Duration::ZERO)],
    )
}

#[test]
fn eighty_of_one_hundred_lines_is_eighty_percent() {
    let summary = eighty_percent();
    assert_eq!(summary.hits(), 80);
    assert_eq!(summary.total(), 100);
    assert!((summary.percent() - 80.0).abs() < 1e-9);
}

#[test]
fn threshold_decides_the_report() {
    let mut strict = passing_report();
    strict.attach_coverage(CoverageSection::from_summary(&eighty_percent(), 100.0));
    assert!(!strict.passed());

    let mut lenient = passing_report();
    lenient.attach_coverage(CoverageSection::from_summary(&eighty_percent(), 75.0));
    assert!(lenient.passed());
}

#[test]
fn coverage_is_pooled_across_files() {
    let mut summary = CoverageSummary::default();
    summary
        .files
        .insert("a.py".into(), CoverageResult::from_lines(1..=10, []));
    summary
        .files
        .insert("b.py".into(), CoverageResult::from_lines(1..=5, 6..=15));
    assert!((summary.percent() - 60.0).abs() < 1e-9);
}

#[test]
fn details_list_missing_lines() {
    colored::control::set_override(false);
    let mut report = passing_report();
    report.attach_coverage(CoverageSection::from_summary(&eighty_percent(), 100.0));

    let brief = report.render(ReportOptions::new(false, false));
    assert!(brief.contains("Coverage: 80.00% (threshold 100.00%)"));
    assert!(!brief.contains("81-100"));

    let detailed = report.render(ReportOptions::new(true, false));
    assert!(detailed.contains("81-100"));
    assert!(detailed.contains("FAILED"));
}

#[test]
fn missing_lines_collapse_into_ranges() {
    assert_eq!(line_ranges(&[1, 2, 3, 7, 9, 10]), "1-3, 7, 9-10");
    assert_eq!(line_ranges(&[]), "");
}

#[test]
fn unavailable_coverage_fails_the_report() {
    let mut report = passing_report();
    report.attach_coverage(CoverageSection::unavailable("No module named coverage", 100.0));
    assert!(!report.passed());
    assert!(
        report
            .render(ReportOptions::default())
            .contains("Coverage could not be collected")
    );
}

#[tokio::test]
async fn a_target_that_never_runs_fails_coverage() {
    let dir = scratch_dir(&[("hello.py", "print('hi')\n")]);
    let suite = Suite::new("noop").case(TestCase::sync("noop", |_| Ok(())));

    let report = CoverageRunner::new(100.0, ["hello.py"])
        .run(&suite, context(&dir))
        .await;
    let section = report.coverage().expect("coverage attached");
    assert!(!section.passed);
    assert!(!report.passed());
    if python_path(None).is_ok() {
        assert_eq!(section.error, None);
        assert_eq!(section.percent, 0.0);
        assert_eq!(section.files[0].file, "hello.py");
        assert_eq!(section.files[0].total, 1);
    }
    let _ = std::fs::remove_dir_all(dir);
}

const BRANCHY: &str = "name = input()\nif name:\n    print(name)\nelse:\n    print('nobody')\n";

fn greeting_suite() -> Suite {
    Suite::new("greet").case(TestCase::new("greets", |cx| {
        Box::pin(async move {
            let request = ScriptRequest::new("branchy.py", ["Ada"]);
            cx.assert_script_output_equal(&request, "Ada", MatchMode::Trimmed)
                .await
        })
    }))
}

#[tokio::test]
async fn scripts_run_under_coverage_are_measured() {
    if !has_coverage_module() {
        return;
    }
    let dir = scratch_dir(&[("branchy.py", BRANCHY)]);

    let strict = CoverageRunner::new(100.0, ["branchy.py"])
        .run(&greeting_suite(), context(&dir))
        .await;
    let section = strict.coverage().expect("coverage attached");
    assert_eq!(section.error, None);
    assert!((section.percent - 75.0).abs() < 1e-9);
    assert!(!strict.passed());

    let lenient = CoverageRunner::new(70.0, ["branchy.py"])
        .run(&greeting_suite(), context(&dir))
        .await;
    assert!(lenient.passed());
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn rewritten_scripts_are_measured_as_the_submitted_file() {
    if !has_coverage_module() {
        return;
    }
    let dir = scratch_dir(&[("limit.py", "LIMIT = 1\nprint(LIMIT)\n")]);
    let suite = Suite::new("limit").case(TestCase::new("limit", |cx| {
        Box::pin(async move {
            let request = ScriptRequest::builder()
                .script("limit.py")
                .variables([("LIMIT".to_string(), "2".to_string())].into())
                .build();
            cx.assert_script_output_equal(&request, "2", MatchMode::Trimmed)
                .await
        })
    }));

    let report = CoverageRunner::new(100.0, ["limit.py"])
        .run(&suite, context(&dir))
        .await;
    assert!(report.passed(), "{}", report.render(ReportOptions::new(true, true)));
    assert_eq!(
        std::fs::read_to_string(dir.join("limit.py")).expect("read back"),
        "LIMIT = 1\nprint(LIMIT)\n"
    );
    let _ = std::fs::remove_dir_all(dir);
}
