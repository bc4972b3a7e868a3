//! The tests manifest, `<tests-root>/harness.yaml`.
//!
//! ```yaml
//! settings:
//!   engine: podman
//!   freshness: content
//! dependencies:
//!   derived: [base]
//! ```
//!
//! Both sections are optional, and so is the file itself.

use std::collections::BTreeMap;
use std::path::Path;

use cbctest_common::config::ConfigOverrides;
use cbctest_common::constants::MANIFEST_FILE;
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::TestName;
use serde::Deserialize;

/// Parsed manifest contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// Settings layered over the built-in defaults.
    pub settings: ConfigOverrides,
    /// Test name to the tests whose images must be built before it.
    pub dependencies: BTreeMap<TestName, Vec<TestName>>,
}

impl Manifest {
    /// Declared dependencies of `test`, empty if it has none.
    #[must_use]
    pub fn dependencies_of(&self, test: &TestName) -> &[TestName] {
        self.dependencies.get(test).map_or(&[], Vec::as_slice)
    }
}

/// Parses manifest text.
///
/// # Errors
///
/// Returns a `Manifest` error on malformed YAML or unknown keys.
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    if content.trim().is_empty() {
        return Ok(Manifest::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Loads `harness.yaml` from the tests root, or an empty manifest if the
/// file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_manifest(tests_root: &Path) -> Result<Manifest> {
    let path = tests_root.join(MANIFEST_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no manifest, using defaults");
        return Ok(Manifest::default());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| HarnessError::io(&path, e))?;
    tracing::info!(path = %path.display(), "loading manifest");
    parse_manifest(&content)
}

#[cfg(test)]
mod tests {
    use cbctest_common::types::Freshness;

    use super::*;

    #[test]
    fn parses_settings_and_dependencies() {
        let manifest = parse_manifest(
            "settings:\n  engine: docker\n  freshness: content\ndependencies:\n  derived: [base]\n",
        )
        .unwrap();
        assert_eq!(manifest.settings.engine.as_deref(), Some("docker"));
        assert_eq!(manifest.settings.freshness, Some(Freshness::Content));
        assert_eq!(
            manifest.dependencies_of(&TestName::new("derived")),
            &[TestName::new("base")]
        );
        assert!(manifest.dependencies_of(&TestName::new("base")).is_empty());
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(parse_manifest("  \n").unwrap(), Manifest::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_manifest("dependancies:\n  a: [b]\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_manifest(dir.path()).unwrap(), Manifest::default());
    }

    #[test]
    fn file_on_disk_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "dependencies:\n  c: [a, b]\n",
        )
        .unwrap();
        let manifest = load_manifest(dir.path()).unwrap();
        assert_eq!(manifest.dependencies_of(&TestName::new("c")).len(), 2);
    }
}
