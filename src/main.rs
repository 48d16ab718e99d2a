#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # gradekit
//!
//! Command-line front end: grade a submission against a suite file, or run
//! one of the inspection tools on a single file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use gradekit::{
    CaseContext, CoverageRunner, GraderConfig, ReportOptions,
    inspect::SourceInspector,
    pattern,
    style::{Ruleset, StyleChecker},
    suite_file,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Run a suite file against the configured submission
    Grade {
        /// Suite file
        suite:    PathBuf,
        /// Grader configuration file
        config:   Option<PathBuf>,
        /// Print the report as JSON
        json:     bool,
        /// Show failure messages
        details:  bool,
        /// Show traces of errored cases
        trace:    bool,
        /// Measure coverage of the required files
        coverage: bool,
    },
    /// Print the structural summary of a file
    Inspect(PathBuf),
    /// Run the style checker on a file
    Style {
        /// File to check
        file:       PathBuf,
        /// Only docstring rules
        docstrings: bool,
    },
    /// Count pattern matches in a file
    Count {
        /// File to search
        file:          PathBuf,
        /// Regular expression
        pattern:       String,
        /// Also count inside comments and docstrings
        keep_comments: bool,
    },
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses a python file name
    fn f() -> impl Parser<PathBuf> {
        positional("FILE").help("Path to a python file")
    }

    let grade = {
        let suite = positional::<PathBuf>("SUITE").help("Path to a suite file");
        let config = long("config")
            .short('c')
            .help("Path to a grader configuration file")
            .argument::<PathBuf>("CONFIG")
            .optional();
        let json = long("json").help("Print the report as JSON").switch();
        let details = long("details").help("Show failure messages").switch();
        let trace = long("trace")
            .help("Show traces of errored cases (implies --details)")
            .switch();
        let coverage = long("coverage")
            .help("Measure line coverage of the required files")
            .switch();
        construct!(Cmd::Grade {
            json,
            details,
            trace,
            coverage,
            config,
            suite,
        })
        .to_options()
        .command("grade")
        .help("Grade a submission against a suite file")
    };

    let inspect = construct!(Cmd::Inspect(f()))
        .to_options()
        .command("inspect")
        .help("Print loops, conditionals and definitions found in a file");

    let style = {
        let docstrings = long("docstrings")
            .help("Only check docstring rules")
            .switch();
        let file = f();
        construct!(Cmd::Style { docstrings, file })
            .to_options()
            .command("style")
            .help("Run the style checker on a file")
    };

    let count = {
        let keep_comments = long("keep-comments")
            .help("Count inside comments and docstrings too")
            .switch();
        let file = f();
        let pattern = positional::<String>("PATTERN").help("Regular expression to count");
        construct!(Cmd::Count {
            keep_comments,
            file,
            pattern,
        })
        .to_options()
        .command("count")
        .help("Count non-overlapping matches of a pattern in a file")
    };

    let cmd = construct!([grade, inspect, style, count]);

    cmd.to_options()
        .descr("Ordered test runner and source inspector for Python submissions")
        .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let passed = match options() {
        Cmd::Grade {
            suite,
            config,
            json,
            details,
            trace,
            coverage,
        } => {
            let config = GraderConfig::load(config.as_deref())?;
            let suite = suite_file::load(&suite)?;
            let options = ReportOptions::new(
                details || config.show_details,
                trace || config.show_trace,
            );
            let cx = CaseContext::new(config.clone());

            let report = if coverage {
                CoverageRunner::new(config.coverage_threshold, config.required_files.clone())
                    .run(&suite, cx)
                    .await
            } else {
                suite.run(cx).await
            };

            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.render(options));
            }
            report.passed()
        }
        Cmd::Inspect(file) => {
            let unit = SourceInspector::new().load(&file)?;
            let summary = serde_json::json!({
                "file": unit.file_name(),
                "analysis": unit.analysis(),
                "parse_error": unit.parse_error().map(ToString::to_string),
                "summary": unit.summary(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Could not serialize summary")?
            );
            true
        }
        Cmd::Style { file, docstrings } => {
            let config = GraderConfig::load(None)?;
            let checker = StyleChecker::builder()
                .program(config.flake8.clone())
                .maybe_full_config(config.style_config.as_ref().map(|p| config.source_path(p)))
                .maybe_docstring_config(
                    config.docstring_config.as_ref().map(|p| config.source_path(p)),
                )
                .timeout(config.style_timeout())
                .build();
            let ruleset = if docstrings {
                Ruleset::DocstringOnly
            } else {
                Ruleset::Full
            };
            let report = checker
                .check(&file, ruleset)
                .await
                .with_context(|| format!("Could not check {}", file.display()))?;
            if report.clean() {
                println!("No style violations found.");
            } else {
                print!("{}", report.output);
            }
            report.clean()
        }
        Cmd::Count {
            file,
            pattern: pat,
            keep_comments,
        } => {
            let unit = SourceInspector::new().load(&file)?;
            let text = if keep_comments {
                unit.code()
            } else {
                unit.stripped()
            };
            println!("{}", pattern::count(text, &pat)?);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
