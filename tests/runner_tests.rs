//! Tests for ordered suites and the assertion vocabulary.

use std::path::{Path, PathBuf};

use gradekit::{
    Assertable, CaseContext, CaseResult, GraderConfig, Suite, TestCase,
    error::{AssertionFailure, FaultKind},
    inspect::LoopKind,
    runner::{MatchMode, Outcome},
    script::ScriptRequest,
    submission::Submission,
    types::ViolationKind,
};

fn scratch_dir(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gradekit-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    for (name, body) in files {
        std::fs::write(dir.join(name), body).expect("write scratch file");
    }
    dir
}

fn context(dir: &Path) -> CaseContext {
    CaseContext::with_submission(GraderConfig::with_base(dir), Submission::new(dir, dir))
}

fn script_fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("python")
        .join("scripts")
        .join(name);
    std::fs::read_to_string(path).expect("read script fixture")
}

fn has_python() -> bool {
    which::which("python3").is_ok() || which::which("python").is_ok()
}

#[tokio::test]
async fn missing_required_file_is_named_exactly() {
    let dir = scratch_dir(&[("a.py", "print('a')\n")]);
    let suite = Suite::new("files").case(TestCase::sync("files", |cx| {
        cx.assert_required_files_present(["a.py", "b.py"])
    }));

    let report = suite.run(context(&dir)).await;
    let case = &report.cases()[0];
    match &case.outcome {
        Outcome::Failed {
            message,
            violations,
        } => {
            assert!(message.starts_with("Missing some required files!"));
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].kind, ViolationKind::MissingRequiredFile);
            assert_eq!(violations[0].message, "b.py");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    assert_eq!(case.output, vec!["Missing b.py"]);
    let _ = std::fs::remove_dir_all(dir);
}

fn ordered_suite() -> Suite {
    Suite::new("ordering")
        .case(TestCase::sync("zeta", |_| Ok(())))
        .case(TestCase::sync("beta", |_| Err(AssertionFailure::new("no").into())).order(1))
        .case(TestCase::sync("alpha", |_| Ok(())).order(1))
        .case(
            TestCase::sync("first", |cx| cx.assert_no_loops("loops.py", LoopKind::Any)).order(-10),
        )
}

#[tokio::test]
async fn the_same_suite_runs_in_the_same_order() {
    let dir = scratch_dir(&[("loops.py", "while True:\n    break\n")]);

    let first = ordered_suite().run(context(&dir)).await;
    let second = ordered_suite().run(context(&dir)).await;

    let summary = |report: &gradekit::Report| -> Vec<(String, &'static str)> {
        report
            .cases()
            .iter()
            .map(|c| (c.name.clone(), c.outcome.label()))
            .collect()
    };
    assert_eq!(summary(&first), summary(&second));
    assert_eq!(
        summary(&first),
        vec![
            ("first".to_string(), "failed"),
            ("zeta".to_string(), "passed"),
            ("alpha".to_string(), "passed"),
            ("beta".to_string(), "failed"),
        ]
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn echo_scripts_return_their_input() {
    if !has_python() {
        return;
    }
    let dir = scratch_dir(&[("echo.py", &script_fixture("echo.py"))]);
    let mut cx = context(&dir);

    let inputs: Vec<Vec<&str>> = vec![
        vec![],
        vec!["one"],
        vec!["one", "two", "three"],
        vec!["  spaced  ", "", "tab\there"],
    ];
    for lines in inputs {
        let expected: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let request = ScriptRequest::new("echo.py", lines.clone());
        let result: CaseResult = cx
            .assert_script_output_equal(&request, &expected, MatchMode::Exact)
            .await;
        assert!(result.is_ok(), "echo failed for {lines:?}: {result:?}");
        assert!(!cx.channel().is_active());
    }
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn variables_are_rewritten_without_touching_the_submission() {
    if !has_python() {
        return;
    }
    let original = script_fixture("greet.py");
    let dir = scratch_dir(&[("greet.py", &original)]);
    let mut cx = context(&dir);

    let request = ScriptRequest::builder()
        .script("greet.py")
        .input(["Ada"])
        .variables([("GREETING".to_string(), "'Hi'".to_string())].into())
        .build();
    cx.assert_script_output_equal(&request, "Name: \nHi, Ada!", MatchMode::Trimmed)
        .await
        .expect("rewritten greeting");

    let on_disk = std::fs::read_to_string(dir.join("greet.py")).expect("read back");
    assert_eq!(on_disk, original);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn crashing_scripts_fail_with_their_error_output() {
    if !has_python() {
        return;
    }
    let dir = scratch_dir(&[("greet.py", &script_fixture("greet.py"))]);
    let mut cx = context(&dir);

    let request = ScriptRequest::new("greet.py", Vec::<String>::new());
    let err = cx
        .assert_script_output_equal(&request, "anything", MatchMode::Trimmed)
        .await
        .expect_err("input() should hit end of file");
    let message = err.to_string();
    assert!(message.starts_with("Error during script execution:"));
    assert!(message.contains("EOFError"));
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn missing_scripts_fail_the_case() {
    let dir = scratch_dir(&[]);
    let suite = Suite::new("missing").case(TestCase::new("runs", |cx| {
        Box::pin(async move {
            let request = ScriptRequest::new("nope.py", ["x"]);
            cx.assert_script_output_equal(&request, "x", MatchMode::Trimmed)
                .await
        })
    }));

    let report = suite.run(context(&dir)).await;
    assert_eq!(
        report.cases()[0].outcome.message(),
        Some("Missing nope.py\n  [missing-required-file] nope.py")
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn a_script_that_never_ends_fails_only_its_own_case() {
    if !has_python() {
        return;
    }
    let dir = scratch_dir(&[("spin.py", "while True:\n    pass\n")]);
    let mut config = GraderConfig::with_base(&dir);
    config.script_timeout_secs = 1;
    let cx = CaseContext::with_submission(config, Submission::new(&dir, &dir));

    let suite = Suite::new("timeouts")
        .case(TestCase::new("spins", |cx| {
            Box::pin(async move {
                let request = ScriptRequest::new("spin.py", Vec::<String>::new());
                cx.assert_script_output_equal(&request, "done", MatchMode::Trimmed)
                    .await
            })
        }))
        .case(TestCase::sync("after", |_| Ok(())));
    let report = suite.run(cx).await;

    let labels: Vec<_> = report.cases().iter().map(|c| c.outcome.label()).collect();
    assert_eq!(labels, vec!["failed", "passed"]);
    assert!(
        report.cases()[0]
            .outcome
            .message()
            .is_some_and(|m| m.contains("did not finish within") && m.contains("timed out"))
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn running_a_script_inside_a_substitution_is_a_usage_error() {
    if !has_python() {
        return;
    }
    let dir = scratch_dir(&[("echo.py", &script_fixture("echo.py"))]);
    let suite = Suite::new("nested").case(TestCase::new("nested", |cx| {
        Box::pin(async move {
            let _held = cx.channel().acquire(["outer"])?;
            let request = ScriptRequest::new("echo.py", ["inner"]);
            cx.assert_script_output_equal(&request, "inner", MatchMode::Trimmed)
                .await
        })
    }));

    let report = suite.run(context(&dir)).await;
    assert!(matches!(
        report.cases()[0].outcome,
        Outcome::Errored {
            kind: FaultKind::Usage,
            ..
        }
    ));
    let _ = std::fs::remove_dir_all(dir);
}
