//! Formatted output helpers for CLI commands.
//!
//! Per-test status lines, diffs and the summary go to stderr; `--json`
//! reports go to stdout.

use cbctest_common::types::TestState;
use cbctest_runner::report::{CleanReport, RunReport, TestReport};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Prints `report` and exits with status 1 if any test did not succeed.
///
/// # Errors
///
/// Returns an error if the JSON report cannot be serialized.
pub fn finish(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(report);
    }
    if !report.success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Prints one line per test, the diff of every mismatch, and a summary.
pub fn print_report(report: &RunReport) {
    eprintln!();
    for test in &report.tests {
        print_test(test);
    }

    let passed = report.passed().count();
    let failed = report.failed().count();
    let errored = report.errored().count();
    eprintln!();
    if report.success() {
        eprintln!("  {GREEN}{BOLD}{passed} passed{RESET}");
    } else {
        eprintln!(
            "  {BOLD}{passed} passed{RESET}, {RED}{BOLD}{failed} failed{RESET}, {YELLOW}{BOLD}{errored} errored{RESET}"
        );
    }
}

fn print_test(test: &TestReport) {
    let rebuilt = if test.rebuilt {
        format!(" {DIM}(rebuilt){RESET}")
    } else {
        String::new()
    };
    eprintln!("    {} {BOLD}{}{RESET}{rebuilt} {DIM}{}{RESET}", marker(test.state), test.name, test.state);

    match (test.state, test.detail.as_deref()) {
        (TestState::Failed, Some(diff)) => {
            for line in diff.lines() {
                eprintln!("      {}", colorize_diff_line(line));
            }
        }
        (_, Some(detail)) => eprintln!("      {detail}"),
        (_, None) => {}
    }
}

const fn marker(state: TestState) -> &'static str {
    match state {
        TestState::Passed | TestState::Built | TestState::SnapshotUpdated => "\x1b[32m●\x1b[0m",
        TestState::Failed | TestState::BuildFailed => "\x1b[31m✗\x1b[0m",
        TestState::Blocked | TestState::Errored => "\x1b[33m!\x1b[0m",
    }
}

fn colorize_diff_line(line: &str) -> String {
    if line.starts_with("@@") {
        format!("{CYAN}{line}{RESET}")
    } else if line.starts_with('+') {
        format!("{GREEN}{line}{RESET}")
    } else if line.starts_with('-') {
        format!("{RED}{line}{RESET}")
    } else {
        line.to_string()
    }
}

/// Prints what `clean-artifacts` removed.
pub fn print_clean(reports: &[CleanReport]) {
    eprintln!();
    for report in reports {
        eprintln!("    {BOLD}{}{RESET} {DIM}{} file(s) removed{RESET}", report.name, report.removed.len());
        for path in &report.removed {
            eprintln!("      {DIM}{}{RESET}", path.display());
        }
        if let Some(error) = &report.error {
            eprintln!("      {RED}{error}{RESET}");
        }
    }
}
