use std::time::Duration;

use gradekit::{
    CoverageRunner,
    script::ScriptRequest,
    style::{Ruleset, StyleChecker},
};

#[test]
fn script_request_builder_takes_iterables() {
    let request = ScriptRequest::builder()
        .script("hello.py")
        .input(["Ada", "Grace"])
        .args(["--loud"])
        .build();

    assert_eq!(request.script(), "hello.py");
    assert_eq!(request.input(), ["Ada".to_string(), "Grace".to_string()]);
    assert_eq!(request.args(), ["--loud".to_string()]);
}

#[test]
fn coverage_runner_defaults_to_full_coverage() {
    let runner = CoverageRunner::builder().targets(["hello.py"]).build();
    assert_eq!(runner.threshold(), 100.0);
    assert_eq!(CoverageRunner::new(75.0, ["a.py"]).threshold(), 75.0);
}

#[tokio::test]
async fn style_checker_reports_a_missing_tool() {
    let checker = StyleChecker::builder()
        .program("gradekit-no-such-linter")
        .timeout(Duration::from_secs(1))
        .build();
    let target = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("python")
        .join("inspect")
        .join("for_only.py");

    let err = checker
        .check(&target, Ruleset::Full)
        .await
        .expect_err("tool is missing");
    assert!(err.to_string().contains("gradekit-no-such-linter"));
}
