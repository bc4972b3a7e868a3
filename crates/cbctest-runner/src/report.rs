//! Per-test outcomes and the run summary.

use std::path::PathBuf;

use cbctest_common::types::{TestName, TestState};
use serde::Serialize;

/// Outcome of one test case in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    /// Test case.
    pub name: TestName,
    /// Final state reached in this run.
    pub state: TestState,
    /// Whether the image was (re)built in this run.
    pub rebuilt: bool,
    /// Diff for a mismatch, error message for a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TestReport {
    /// Report without details.
    #[must_use]
    pub const fn new(name: TestName, state: TestState, rebuilt: bool) -> Self {
        Self {
            name,
            state,
            rebuilt,
            detail: None,
        }
    }

    /// Attaches a diff or error message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcomes of every reported test case, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Individual outcomes.
    pub tests: Vec<TestReport>,
}

impl RunReport {
    /// Appends an outcome.
    pub fn push(&mut self, report: TestReport) {
        self.tests.push(report);
    }

    /// Outcome for `name`, if it was reported.
    #[must_use]
    pub fn get(&self, name: &TestName) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.name == *name)
    }

    /// Tests that built, passed or had their snapshot updated.
    pub fn passed(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| !t.state.is_failure())
    }

    /// Tests whose output did not match the golden snapshot.
    pub fn failed(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| t.state == TestState::Failed)
    }

    /// Tests that could not be built or checked.
    pub fn errored(&self) -> impl Iterator<Item = &TestReport> {
        self.tests
            .iter()
            .filter(|t| t.state.is_failure() && t.state != TestState::Failed)
    }

    /// Whether every reported test succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.tests.iter().all(|t| !t.state.is_failure())
    }
}

/// Outcome of cleaning one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Test case.
    pub name: TestName,
    /// Artifact files that were deleted.
    pub removed: Vec<PathBuf>,
    /// Engine error while removing the image, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(states: &[(&str, TestState)]) -> RunReport {
        let mut run = RunReport::default();
        for (name, state) in states {
            run.push(TestReport::new(TestName::new(*name), *state, false));
        }
        run
    }

    #[test]
    fn all_passing_is_success() {
        let run = report(&[("a", TestState::Passed), ("b", TestState::SnapshotUpdated)]);
        assert!(run.success());
        assert_eq!(run.passed().count(), 2);
    }

    #[test]
    fn failures_and_errors_are_split() {
        let run = report(&[
            ("a", TestState::Passed),
            ("b", TestState::Failed),
            ("c", TestState::BuildFailed),
            ("d", TestState::Blocked),
        ]);
        assert!(!run.success());
        assert_eq!(run.passed().count(), 1);
        assert_eq!(run.failed().count(), 1);
        assert_eq!(run.errored().count(), 2);
        assert_eq!(run.get(&"c".into()).unwrap().state, TestState::BuildFailed);
    }

    #[test]
    fn serializes_without_empty_detail() {
        let run = report(&[("a", TestState::Passed)]);
        let json = serde_json::to_string(&run).unwrap();
        assert_eq!(json, r#"{"tests":[{"name":"a","state":"passed","rebuilt":false}]}"#);
    }
}
