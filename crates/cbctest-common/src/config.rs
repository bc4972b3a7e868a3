//! Configuration model for a harness run.
//!
//! Values start from [`HarnessConfig::default`], are overlaid with the
//! settings found in the tests manifest, and finally with command-line
//! flags. Each layer is a [`ConfigOverrides`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CHECKER, DEFAULT_NAMESPACE, DEFAULT_TESTS_ROOT};
use crate::types::Freshness;

/// Resolved configuration for one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Directory holding one subdirectory per test case.
    pub tests_root: PathBuf,
    /// Directory handed to the checker as its configuration directory.
    /// Defaults to the tests root.
    pub config_dir: Option<PathBuf>,
    /// Container engine executable. Auto-detected when unset.
    pub engine: Option<String>,
    /// Image namespace; images are tagged `<namespace>/<test>`.
    pub namespace: String,
    /// Checking tool executable.
    pub checker: PathBuf,
    /// Whether to write the `.containerinfo` descriptor after each build.
    pub metadata: bool,
    /// Staleness policy of the build tracker.
    pub freshness: Freshness,
    /// Kill the checker after this many seconds.
    pub timeout_secs: Option<u64>,
    /// Rebuild every selected image regardless of freshness.
    pub force: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tests_root: PathBuf::from(DEFAULT_TESTS_ROOT),
            config_dir: None,
            engine: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            checker: PathBuf::from(DEFAULT_CHECKER),
            metadata: true,
            freshness: Freshness::default(),
            timeout_secs: None,
            force: false,
        }
    }
}

impl HarnessConfig {
    /// Overlays every value set in `overrides` onto this configuration.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(dir) = &overrides.config_dir {
            self.config_dir = Some(dir.clone());
        }
        if let Some(engine) = &overrides.engine {
            self.engine = Some(engine.clone());
        }
        if let Some(namespace) = &overrides.namespace {
            self.namespace.clone_from(namespace);
        }
        if let Some(checker) = &overrides.checker {
            self.checker.clone_from(checker);
        }
        if let Some(metadata) = overrides.metadata {
            self.metadata = metadata;
        }
        if let Some(freshness) = overrides.freshness {
            self.freshness = freshness;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = Some(secs);
        }
        if let Some(force) = overrides.force {
            self.force = force;
        }
        self
    }

    /// Configuration directory passed to the checker.
    #[must_use]
    pub fn effective_config_dir(&self) -> PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(|| self.tests_root.clone())
    }
}

/// A partial configuration layer; unset fields leave the lower layer intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    /// See [`HarnessConfig::config_dir`].
    pub config_dir: Option<PathBuf>,
    /// See [`HarnessConfig::engine`].
    pub engine: Option<String>,
    /// See [`HarnessConfig::namespace`].
    pub namespace: Option<String>,
    /// See [`HarnessConfig::checker`].
    pub checker: Option<PathBuf>,
    /// See [`HarnessConfig::metadata`].
    pub metadata: Option<bool>,
    /// See [`HarnessConfig::freshness`].
    pub freshness: Option<Freshness>,
    /// See [`HarnessConfig::timeout_secs`].
    pub timeout_secs: Option<u64>,
    /// See [`HarnessConfig::force`].
    pub force: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_conventions() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.tests_root, PathBuf::from("tests"));
        assert_eq!(cfg.namespace, "cbc-tests");
        assert!(cfg.metadata);
        assert_eq!(cfg.freshness, Freshness::Mtime);
        assert_eq!(cfg.effective_config_dir(), PathBuf::from("tests"));
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let overrides = ConfigOverrides {
            engine: Some("docker".into()),
            metadata: Some(false),
            ..ConfigOverrides::default()
        };
        let cfg = HarnessConfig::default().with_overrides(&overrides);
        assert_eq!(cfg.engine.as_deref(), Some("docker"));
        assert!(!cfg.metadata);
        assert_eq!(cfg.namespace, "cbc-tests");
    }

    #[test]
    fn explicit_config_dir_wins() {
        let overrides = ConfigOverrides {
            config_dir: Some(PathBuf::from("/etc/cbc")),
            ..ConfigOverrides::default()
        };
        let cfg = HarnessConfig::default().with_overrides(&overrides);
        assert_eq!(cfg.effective_config_dir(), PathBuf::from("/etc/cbc"));
    }
}
