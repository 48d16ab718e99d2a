#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Deterministic, sequential execution of a suite of test cases.

use std::{any::Any, panic::AssertUnwindSafe, time::Instant};

use futures::FutureExt;
use tracing::{info, warn};

use super::{
    case::{CaseRun, Outcome, TestCase},
    context::{Assertable, CaseContext},
};
use crate::{
    error::{CaseResult, FaultKind},
    report::{CaseReport, Report},
};

/// Appended to the message of a failed gate case.
const REQUIRED_SUFFIX: &str =
    "This test was required. All of the following tests will fail automatically.";

/// An ordered collection of test cases.
#[derive(Debug, Default)]
pub struct Suite {
    /// Suite name, shown in reports.
    name:  String,
    /// Cases in registration order.
    cases: Vec<TestCase>,
}

impl Suite {
    /// Creates an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:  name.into(),
            cases: Vec::new(),
        }
    }

    /// Registers a case, builder style.
    pub fn case(mut self, case: TestCase) -> Self {
        self.add(case);
        self
    }

    /// Registers a case; its registration index is its default order.
    pub fn add(&mut self, mut case: TestCase) {
        case.set_index(self.cases.len());
        self.cases.push(case);
    }

    /// Suite name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registered cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// True when no cases are registered.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Cases in execution order: by explicit order or registration index,
    /// ties broken by name.
    pub fn ordered(&self) -> Vec<&TestCase> {
        let mut cases: Vec<&TestCase> = self.cases.iter().collect();
        cases.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.name().cmp(b.name()))
                .then_with(|| a.index().cmp(&b.index()))
        });
        cases
    }

    /// Runs every case in order, one at a time, and reports the outcomes.
    ///
    /// The context is consumed so its source cache cannot outlive the run.
    pub async fn run(&self, mut cx: CaseContext) -> Report {
        let mut reports = Vec::with_capacity(self.cases.len());
        let mut failed_gate: Option<String> = None;
        info!("Running suite {} ({} cases)", self.name, self.cases.len());

        for case in self.ordered() {
            let mut run = CaseRun::new(case.name());
            let started = Instant::now();
            run.start();

            let mut outcome = match &failed_gate {
                Some(gate) => Outcome::failed(format!("Failed required test: {gate}")),
                None => run_case(case, &mut cx).await,
            };

            if case.is_required() && !outcome.is_passed() && failed_gate.is_none() {
                outcome.append_message(REQUIRED_SUFFIX);
                failed_gate = Some(
                    case.description_text()
                        .unwrap_or_else(|| case.name())
                        .to_string(),
                );
            }

            match &outcome {
                Outcome::Passed => info!("{}: passed", case.name()),
                Outcome::Failed { .. } => info!("{}: failed", case.name()),
                Outcome::Errored { kind, message, .. } => {
                    warn!("{}: errored ({kind}): {message}", case.name())
                }
            }

            let notes = cx.take_notes();
            let duration = started.elapsed();
            if let Err(e) = run.record(outcome) {
                warn!("{e}");
            }
            let outcome = run.into_outcome().unwrap_or(Outcome::Errored {
                kind:    FaultKind::Usage,
                message: format!("no outcome recorded for {}", case.name()),
                trace:   None,
            });
            reports.push(CaseReport::new(case, outcome, notes, duration));
        }

        Report::new(self.name.clone(), reports)
    }
}

/// Checks a case's required symbols, then runs its body, converting panics
/// into errored outcomes.
async fn run_case(case: &TestCase, cx: &mut CaseContext) -> Outcome {
    info!("Running {}", case.name());

    for (file, names) in case.required_symbols() {
        if let Err(err) = cx.assert_required_symbols(file, names) {
            return Outcome::from_result(Err(err));
        }
    }

    // synchronous bodies run inside `invoke`, so it is called on first poll
    let body = async move { case.invoke(cx).await };
    let result: Result<CaseResult, Box<dyn Any + Send>> =
        AssertUnwindSafe(body).catch_unwind().await;

    match result {
        Ok(result) => Outcome::from_result(result),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            Outcome::Errored {
                kind:    FaultKind::Panic,
                message: format!("test case panicked: {message}"),
                trace:   Some(message),
            }
        }
    }
}

/// Extracts the text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
