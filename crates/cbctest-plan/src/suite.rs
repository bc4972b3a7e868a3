//! Validated set of test cases and per-run plans.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use cbctest_common::constants::{BUILT_MARKER, DOCKERFILE, GOLDEN_FILE};
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::TestName;

use crate::graph::DependencyGraph;
use crate::manifest::Manifest;

/// One test directory and the tests it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Directory name.
    pub name: TestName,
    /// Build context directory; also the checker's working directory.
    pub dir: PathBuf,
    /// Tests whose images must exist before this one is built.
    pub dependencies: Vec<TestName>,
}

impl TestCase {
    /// Path of the build instructions.
    #[must_use]
    pub fn dockerfile(&self) -> PathBuf {
        self.dir.join(DOCKERFILE)
    }

    /// Path of the built marker.
    #[must_use]
    pub fn marker(&self) -> PathBuf {
        self.dir.join(BUILT_MARKER)
    }

    /// Path of the exported image archive.
    #[must_use]
    pub fn archive(&self) -> PathBuf {
        self.dir.join(self.name.archive_name())
    }

    /// Path of the metadata descriptor.
    #[must_use]
    pub fn descriptor(&self) -> PathBuf {
        self.dir.join(self.name.descriptor_name())
    }

    /// Path of the golden snapshot.
    #[must_use]
    pub fn golden(&self) -> PathBuf {
        self.dir.join(GOLDEN_FILE)
    }
}

/// The tests selected for one run, in build order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Every test to build, dependencies before dependents.
    pub order: Vec<TestName>,
    /// Tests that were asked for (as opposed to pulled in as dependencies).
    pub targets: BTreeSet<TestName>,
}

impl Plan {
    /// Whether `test` was asked for rather than pulled in.
    #[must_use]
    pub fn is_target(&self, test: &TestName) -> bool {
        self.targets.contains(test)
    }
}

/// Every discovered test case, with its dependency graph validated.
#[derive(Debug)]
pub struct TestSuite {
    root: PathBuf,
    cases: BTreeMap<TestName, TestCase>,
    graph: DependencyGraph,
    order: Vec<TestName>,
}

impl TestSuite {
    /// Discovers the tests under `tests_root` and wires up the dependencies
    /// declared in `manifest`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the manifest names an unknown test or the
    /// dependencies form a cycle, or an I/O error from discovery.
    pub fn load(tests_root: &Path, manifest: &Manifest) -> Result<Self> {
        let discovered = crate::discovery::discover(tests_root)?;
        let mut cases = BTreeMap::new();
        for (name, dir) in discovered {
            let dependencies = manifest.dependencies_of(&name).to_vec();
            let _ = cases.insert(
                name.clone(),
                TestCase {
                    name,
                    dir,
                    dependencies,
                },
            );
        }

        for (dependent, deps) in &manifest.dependencies {
            if !cases.contains_key(dependent) {
                return Err(HarnessError::Config {
                    message: format!("manifest declares dependencies for unknown test {dependent}"),
                });
            }
            if let Some(missing) = deps.iter().find(|d| !cases.contains_key(*d)) {
                return Err(HarnessError::Config {
                    message: format!("test {dependent} depends on unknown test {missing}"),
                });
            }
        }

        let mut graph = DependencyGraph::new();
        for case in cases.values() {
            let node = graph.add_test(&case.name);
            for dep in &case.dependencies {
                let dep_node = graph.add_test(dep);
                graph.add_dependency(node, dep_node);
            }
        }
        let order = graph.resolve_order()?;

        tracing::info!(root = %tests_root.display(), tests = cases.len(), "loaded test suite");
        Ok(Self {
            root: tests_root.to_path_buf(),
            cases,
            graph,
            order,
        })
    }

    /// Tests root the suite was loaded from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up a test case by name.
    #[must_use]
    pub fn get(&self, name: &TestName) -> Option<&TestCase> {
        self.cases.get(name)
    }

    /// Number of test cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether no test case was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Builds the plan for `selection`, or for every test if it is empty.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if a selected test does not exist.
    pub fn plan(&self, selection: &[TestName]) -> Result<Plan> {
        if let Some(unknown) = selection.iter().find(|s| !self.cases.contains_key(*s)) {
            return Err(HarnessError::NotFound {
                kind: "test case",
                id: unknown.to_string(),
            });
        }

        if selection.is_empty() {
            return Ok(Plan {
                order: self.order.clone(),
                targets: self.cases.keys().cloned().collect(),
            });
        }

        let needed = self.graph.closure(selection);
        Ok(Plan {
            order: self
                .order
                .iter()
                .filter(|name| needed.contains(*name))
                .cloned()
                .collect(),
            targets: selection.iter().cloned().collect(),
        })
    }
}
