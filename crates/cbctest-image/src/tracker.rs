//! Incremental build tracking.
//!
//! A test counts as built while its `built` marker exists and is current.
//! With [`Freshness::Mtime`] the marker is current when it is newer than
//! every context file and no older than any dependency's marker. With
//! [`Freshness::Content`] the digest recorded in the marker must match the
//! digest of the context and the dependencies' recorded digests.

use std::path::Path;

use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::{Freshness, TestName};
use cbctest_plan::TestCase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context;

/// Contents of the `built` marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMarker {
    /// When the build finished.
    pub built_at: DateTime<Utc>,
    /// Context digest at build time.
    pub digest: String,
}

/// Why a test does or does not need building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The marker is current; nothing to do.
    Fresh,
    /// Rebuild requested regardless of state.
    Forced,
    /// No marker, or an unreadable one.
    Unbuilt,
    /// A context file changed after the marker was written.
    ContextChanged,
    /// A dependency was rebuilt after this test, or is not built at all.
    DependencyChanged(TestName),
}

impl Staleness {
    /// Whether a build is required.
    #[must_use]
    pub const fn needs_build(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Decides staleness and maintains `built` markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildTracker {
    freshness: Freshness,
    force: bool,
}

impl BuildTracker {
    /// Creates a tracker with the given policy.
    #[must_use]
    pub const fn new(freshness: Freshness, force: bool) -> Self {
        Self { freshness, force }
    }

    /// Determines whether `case` needs building. `dependencies` are the test
    /// cases it depends on.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the context or markers cannot be inspected.
    pub fn check(&self, case: &TestCase, dependencies: &[&TestCase]) -> Result<Staleness> {
        if self.force {
            return Ok(Staleness::Forced);
        }
        let marker_path = case.marker();
        if !marker_path.exists() {
            return Ok(Staleness::Unbuilt);
        }

        let staleness = match self.freshness {
            Freshness::Mtime => Self::check_mtime(case, dependencies)?,
            Freshness::Content => Self::check_content(case, dependencies)?,
        };
        tracing::debug!(test = %case.name, ?staleness, policy = %self.freshness, "checked build state");
        Ok(staleness)
    }

    fn check_mtime(case: &TestCase, dependencies: &[&TestCase]) -> Result<Staleness> {
        let marker_time = context::modified(&case.marker())?;
        if let Some(newest) = context::newest_mtime(&case.dir, &case.name)? {
            if newest > marker_time {
                return Ok(Staleness::ContextChanged);
            }
        }
        for dep in dependencies {
            let dep_marker = dep.marker();
            if !dep_marker.exists() || context::modified(&dep_marker)? > marker_time {
                return Ok(Staleness::DependencyChanged(dep.name.clone()));
            }
        }
        Ok(Staleness::Fresh)
    }

    fn check_content(case: &TestCase, dependencies: &[&TestCase]) -> Result<Staleness> {
        let Some(marker) = read_marker(&case.marker())? else {
            return Ok(Staleness::Unbuilt);
        };
        let mut dep_digests = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            match read_marker(&dep.marker())? {
                Some(m) => dep_digests.push((dep.name.clone(), m.digest)),
                None => return Ok(Staleness::DependencyChanged(dep.name.clone())),
            }
        }
        let current = context::context_digest(&case.dir, &case.name, &dep_digests)?;
        if current == marker.digest {
            Ok(Staleness::Fresh)
        } else {
            Ok(Staleness::ContextChanged)
        }
    }

    /// Writes the marker for a successful build of `case`.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency marker is unreadable or the marker
    /// cannot be written.
    pub fn mark_built(&self, case: &TestCase, dependencies: &[&TestCase]) -> Result<BuildMarker> {
        let mut dep_digests = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            let digest = read_marker(&dep.marker())?.map(|m| m.digest).unwrap_or_default();
            dep_digests.push((dep.name.clone(), digest));
        }
        let marker = BuildMarker {
            built_at: Utc::now(),
            digest: context::context_digest(&case.dir, &case.name, &dep_digests)?,
        };
        let path = case.marker();
        let json = serde_json::to_string_pretty(&marker)?;
        std::fs::write(&path, json + "\n").map_err(|e| HarnessError::io(&path, e))?;
        tracing::info!(test = %case.name, digest = %marker.digest, "marked built");
        Ok(marker)
    }

    /// Removes the marker so the next run rebuilds `case`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing marker cannot be removed.
    pub fn invalidate(&self, case: &TestCase) -> Result<()> {
        remove_if_exists(&case.marker())
    }
}

/// Reads a marker, returning `None` if it is missing or not valid JSON
/// (markers from older harness versions were empty files).
///
/// # Errors
///
/// Returns an I/O error if an existing marker cannot be read.
pub fn read_marker(path: &Path) -> Result<Option<BuildMarker>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content).ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HarnessError::io(path, e)),
    }
}

/// Removes a file, treating an already missing file as success.
///
/// # Errors
///
/// Returns an I/O error for any other failure.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HarnessError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    use super::*;

    fn make_case(root: &Path, name: &str) -> TestCase {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Dockerfile"), format!("FROM scratch\nLABEL t={name}\n")).unwrap();
        TestCase {
            name: TestName::new(name),
            dir,
            dependencies: Vec::new(),
        }
    }

    fn set_mtime(path: &PathBuf, time: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn epoch(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn missing_marker_is_unbuilt() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        let tracker = BuildTracker::default();
        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::Unbuilt);
    }

    #[test]
    fn force_always_rebuilds() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        let tracker = BuildTracker::new(Freshness::Mtime, true);
        let _ = tracker.mark_built(&case, &[]).unwrap();
        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::Forced);
    }

    #[test]
    fn mtime_marker_newer_than_context_is_fresh() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        let tracker = BuildTracker::default();
        let _ = tracker.mark_built(&case, &[]).unwrap();
        set_mtime(&case.dockerfile(), epoch(1_000));
        set_mtime(&case.marker(), epoch(2_000));

        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::Fresh);
    }

    #[test]
    fn mtime_edited_context_is_stale() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        let tracker = BuildTracker::default();
        let _ = tracker.mark_built(&case, &[]).unwrap();
        set_mtime(&case.marker(), epoch(2_000));
        set_mtime(&case.dockerfile(), epoch(3_000));

        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::ContextChanged);
    }

    #[test]
    fn mtime_rebuilt_dependency_makes_dependent_stale() {
        let root = tempfile::tempdir().unwrap();
        let base = make_case(root.path(), "base");
        let derived = make_case(root.path(), "derived");
        let tracker = BuildTracker::default();
        let _ = tracker.mark_built(&base, &[]).unwrap();
        let _ = tracker.mark_built(&derived, &[&base]).unwrap();
        set_mtime(&base.dockerfile(), epoch(1_000));
        set_mtime(&derived.dockerfile(), epoch(1_000));
        set_mtime(&derived.marker(), epoch(2_000));
        set_mtime(&base.marker(), epoch(2_000));
        assert_eq!(tracker.check(&derived, &[&base]).unwrap(), Staleness::Fresh);

        set_mtime(&base.marker(), epoch(2_500));
        assert_eq!(
            tracker.check(&derived, &[&base]).unwrap(),
            Staleness::DependencyChanged("base".into())
        );
    }

    #[test]
    fn content_policy_ignores_touching() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        let tracker = BuildTracker::new(Freshness::Content, false);
        let _ = tracker.mark_built(&case, &[]).unwrap();
        set_mtime(&case.marker(), epoch(1_000));
        set_mtime(&case.dockerfile(), epoch(5_000));
        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::Fresh);

        std::fs::write(case.dockerfile(), "FROM busybox\n").unwrap();
        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::ContextChanged);
    }

    #[test]
    fn content_policy_follows_dependency_digest() {
        let root = tempfile::tempdir().unwrap();
        let base = make_case(root.path(), "base");
        let derived = make_case(root.path(), "derived");
        let tracker = BuildTracker::new(Freshness::Content, false);
        let _ = tracker.mark_built(&base, &[]).unwrap();
        let _ = tracker.mark_built(&derived, &[&base]).unwrap();
        assert_eq!(tracker.check(&derived, &[&base]).unwrap(), Staleness::Fresh);

        std::fs::write(base.dockerfile(), "FROM busybox\n").unwrap();
        let _ = tracker.mark_built(&base, &[]).unwrap();
        assert_eq!(
            tracker.check(&derived, &[&base]).unwrap(),
            Staleness::ContextChanged
        );
    }

    #[test]
    fn legacy_empty_marker_reads_as_none() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        std::fs::write(case.marker(), "").unwrap();
        assert!(read_marker(&case.marker()).unwrap().is_none());
        let tracker = BuildTracker::new(Freshness::Content, false);
        assert_eq!(tracker.check(&case, &[]).unwrap(), Staleness::Unbuilt);
    }

    #[test]
    fn invalidate_removes_marker_and_tolerates_absence() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "base");
        let tracker = BuildTracker::default();
        let _ = tracker.mark_built(&case, &[]).unwrap();
        tracker.invalidate(&case).unwrap();
        assert!(!case.marker().exists());
        tracker.invalidate(&case).unwrap();
    }
}
