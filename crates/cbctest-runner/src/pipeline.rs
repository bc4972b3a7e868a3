//! The dependency-ordered build, check and compare pipeline.
//!
//! Tests are processed one at a time in topological order. Each selected
//! test is built if stale (its dependencies having been handled earlier in
//! the same pass), then checked and either compared against or written to
//! its golden snapshot. A failed build blocks the tests that depend on it
//! but not unrelated ones; configuration errors abort the run.

use std::collections::BTreeMap;
use std::time::Duration;

use cbctest_common::config::HarnessConfig;
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::{TestName, TestState};
use cbctest_image::{BuildTracker, ContainerEngine, ImageBuilder, LazyEngine};
use cbctest_plan::manifest::Manifest;
use cbctest_plan::{TestCase, TestSuite};

use crate::checker::{Checker, CommandChecker};
use crate::compare::{Comparison, compare};
use crate::report::{CleanReport, RunReport, TestReport};
use crate::snapshot;

/// What to do with each selected test once its image is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only build.
    Build,
    /// Check and compare against the golden snapshot.
    Test,
    /// Check and overwrite the golden snapshot.
    Regenerate,
}

/// Orchestrates builds and checker runs over a test suite.
pub struct Pipeline {
    suite: TestSuite,
    builder: ImageBuilder,
    tracker: BuildTracker,
    checker: Box<dyn Checker>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("tests", &self.suite.len())
            .field("builder", &self.builder)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assembles a pipeline from its parts.
    #[must_use]
    pub fn new(
        suite: TestSuite,
        builder: ImageBuilder,
        tracker: BuildTracker,
        checker: Box<dyn Checker>,
    ) -> Self {
        Self {
            suite,
            builder,
            tracker,
            checker,
        }
    }

    /// Loads the suite under `config.tests_root` and wires the configured
    /// engine and checker. The engine is only looked up once an image has to
    /// be built or removed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if discovery or the dependency graph is
    /// invalid.
    pub fn from_config(config: &HarnessConfig, manifest: &Manifest) -> Result<Self> {
        let suite = TestSuite::load(&config.tests_root, manifest)?;
        if suite.is_empty() {
            tracing::warn!(root = %suite.root().display(), "no test cases found");
        }
        let engine = LazyEngine::new(config.engine.clone());
        tracing::debug!(engine = %engine.name(), namespace = %config.namespace, "configured container engine");
        let builder = ImageBuilder::new(Box::new(engine), config.namespace.clone(), config.metadata);
        let tracker = BuildTracker::new(config.freshness, config.force);
        let checker = CommandChecker::new(
            &config.checker,
            &config.effective_config_dir(),
            config.timeout_secs.map(Duration::from_secs),
        )?;
        Ok(Self::new(suite, builder, tracker, Box::new(checker)))
    }

    /// Builds the selected tests (all if empty) and their dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration problems; build failures are
    /// reported per test.
    pub fn build_all(&self, selection: &[TestName]) -> Result<RunReport> {
        self.execute(Mode::Build, selection)
    }

    /// Builds, checks and compares the selected tests.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration problems.
    pub fn run_tests(&self, selection: &[TestName]) -> Result<RunReport> {
        self.execute(Mode::Test, selection)
    }

    /// Builds and checks the selected tests, overwriting their snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration problems.
    pub fn regenerate(&self, selection: &[TestName]) -> Result<RunReport> {
        self.execute(Mode::Regenerate, selection)
    }

    /// Runs `mode` over the plan for `selection`.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration problems.
    pub fn execute(&self, mode: Mode, selection: &[TestName]) -> Result<RunReport> {
        let plan = self.suite.plan(selection)?;
        tracing::info!(?mode, tests = plan.order.len(), targets = plan.targets.len(), "starting run");

        // Test name to the failed build it traces back to.
        let mut broken: BTreeMap<TestName, TestName> = BTreeMap::new();
        let mut report = RunReport::default();

        for name in &plan.order {
            let Some(case) = self.suite.get(name) else {
                continue;
            };

            if let Some(dep) = case.dependencies.iter().find(|d| broken.contains_key(*d)) {
                let root = broken.get(dep).cloned().unwrap_or_else(|| dep.clone());
                tracing::warn!(test = %name, dependency = %dep, "skipping, dependency did not build");
                let err = HarnessError::DependencyFailed {
                    test: name.to_string(),
                    dependency: root.to_string(),
                };
                report.push(TestReport::new(name.clone(), TestState::Blocked, false).with_detail(err.to_string()));
                let _ = broken.insert(name.clone(), root);
                continue;
            }

            let rebuilt = match self.ensure_built(case) {
                Ok(rebuilt) => rebuilt,
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::error!(test = %name, error = %e, "build failed");
                    report.push(TestReport::new(name.clone(), TestState::BuildFailed, true).with_detail(e.to_string()));
                    let _ = broken.insert(name.clone(), name.clone());
                    continue;
                }
            };

            if !plan.is_target(name) {
                continue;
            }
            report.push(self.finish(mode, case, rebuilt));
        }

        tracing::info!(
            passed = report.passed().count(),
            failed = report.failed().count(),
            errored = report.errored().count(),
            "run finished"
        );
        Ok(report)
    }

    /// Builds `case` if the tracker says it is stale. Returns whether a
    /// build happened.
    fn ensure_built(&self, case: &TestCase) -> Result<bool> {
        let dependencies: Vec<&TestCase> = case
            .dependencies
            .iter()
            .filter_map(|d| self.suite.get(d))
            .collect();

        let staleness = self.tracker.check(case, &dependencies)?;
        if !staleness.needs_build() {
            tracing::debug!(test = %case.name, "image up to date");
            return Ok(false);
        }

        tracing::info!(test = %case.name, ?staleness, "building test image");
        self.tracker.invalidate(case)?;
        let built = self.builder.build(case)?;
        tracing::info!(
            test = %case.name,
            image = %built.image,
            archive = %built.archive.display(),
            tags = built.descriptor.as_ref().map_or(0, |d| d.tags.len()),
            "image built"
        );
        let _ = self.tracker.mark_built(case, &dependencies)?;
        Ok(true)
    }

    /// Post-build step for a selected test.
    fn finish(&self, mode: Mode, case: &TestCase, rebuilt: bool) -> TestReport {
        let name = case.name.clone();
        if mode == Mode::Build {
            return TestReport::new(name, TestState::Built, rebuilt);
        }

        let run = match self.checker.run(case) {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(test = %name, error = %e, "checker could not run");
                return TestReport::new(name, TestState::Errored, rebuilt).with_detail(e.to_string());
            }
        };
        tracing::debug!(test = %name, exit_code = run.exit_code(), "checker output captured");

        let outcome = if mode == Mode::Regenerate {
            snapshot::write_golden(&case.golden(), run.text()).map(|()| (TestState::SnapshotUpdated, None))
        } else {
            snapshot::read_golden(&case.golden(), true).map(|golden| match compare(&golden, run.text()) {
                Comparison::Match => (TestState::Passed, None),
                Comparison::Mismatch(m) => {
                    tracing::warn!(test = %name, added = m.added, removed = m.removed, "output differs from snapshot");
                    (TestState::Failed, Some(m.diff))
                }
            })
        };

        match outcome {
            Ok((state, detail)) => {
                let report = TestReport::new(name, state, rebuilt);
                match detail {
                    Some(d) => report.with_detail(d),
                    None => report,
                }
            }
            Err(e) => TestReport::new(name, TestState::Errored, rebuilt).with_detail(e.to_string()),
        }
    }

    /// Removes the build artifacts of the selected tests (all if empty), and
    /// their images if `remove_images` is set. Dependencies are not touched.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown selection or a file that cannot be
    /// removed; engine failures are reported per test.
    pub fn clean(&self, selection: &[TestName], remove_images: bool) -> Result<Vec<CleanReport>> {
        let plan = self.suite.plan(selection)?;
        let mut reports = Vec::new();
        for name in plan.order.iter().filter(|n| plan.is_target(n)) {
            let Some(case) = self.suite.get(name) else {
                continue;
            };
            let removed = self.builder.clean(case, false)?;
            let error = if remove_images {
                self.builder.remove_image(case).err().map(|e| {
                    tracing::warn!(test = %name, error = %e, "could not remove image");
                    e.to_string()
                })
            } else {
                None
            };
            reports.push(CleanReport {
                name: name.clone(),
                removed,
                error,
            });
        }
        Ok(reports)
    }
}
