//! Domain primitive types used across the cbctest workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ARCHIVE_EXTENSION, DESCRIPTOR_EXTENSION, DISTURL_PREFIX};

/// Identity of a test case: the name of its directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestName(String);

impl TestName {
    /// Creates a test name from a directory name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Image reference the test is built as, `<namespace>/<test>`.
    #[must_use]
    pub fn image_ref(&self, namespace: &str) -> String {
        format!("{namespace}/{}", self.0)
    }

    /// Synthetic distribution URL, `obs://container:build:checks/<test>`.
    #[must_use]
    pub fn disturl(&self) -> String {
        format!("{DISTURL_PREFIX}{}", self.0)
    }

    /// File name of the exported archive, `<test>.tar`.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}.{ARCHIVE_EXTENSION}", self.0)
    }

    /// File name of the metadata descriptor, `<test>.containerinfo`.
    #[must_use]
    pub fn descriptor_name(&self) -> String {
        format!("{}.{DESCRIPTOR_EXTENSION}", self.0)
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TestName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How the build tracker decides that a built image is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Marker modification time against the newest context file.
    #[default]
    Mtime,
    /// SHA-256 digest of the context contents stored in the marker.
    Content,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mtime => write!(f, "mtime"),
            Self::Content => write!(f, "content"),
        }
    }
}

/// Per-run outcome of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestState {
    /// Image, archive and marker are current.
    Built,
    /// Captured output matched the golden snapshot.
    Passed,
    /// Captured output differed from the golden snapshot.
    Failed,
    /// Golden snapshot was overwritten with the captured output.
    SnapshotUpdated,
    /// The container engine rejected the build.
    BuildFailed,
    /// A dependency failed to build, so this test was not attempted.
    Blocked,
    /// The checker could not be run to completion.
    Errored,
}

impl TestState {
    /// Whether this state counts against the run's exit status.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::BuildFailed | Self::Blocked | Self::Errored
        )
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => write!(f, "built"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::SnapshotUpdated => write!(f, "snapshot-updated"),
            Self::BuildFailed => write!(f, "build-failed"),
            Self::Blocked => write!(f, "blocked"),
            Self::Errored => write!(f, "errored"),
        }
    }
}
