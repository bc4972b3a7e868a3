//! Unified error type for the cbctest workspace.
//!
//! Configuration-level variants abort a whole run; the build and checker
//! variants are scoped to a single test case and get reported per test.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The harness configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A `#!BuildTag` directive could not be parsed.
    #[error("{}:{line}: invalid directive: {message}", path.display())]
    Directive {
        /// File containing the directive.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// An external program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The container engine returned a non-zero status.
    #[error("{step} of {test} failed with status {status}: {stderr}")]
    BuildFailed {
        /// Test case being built.
        test: String,
        /// Engine step that failed (`build`, `save`, `rmi`).
        step: &'static str,
        /// Exit status of the engine, `128 + signal` if it was killed.
        status: i32,
        /// Trailing part of the engine's error output.
        stderr: String,
    },

    /// A dependency of the test failed to build earlier in the run.
    #[error("dependency {dependency} of {test} did not build")]
    DependencyFailed {
        /// Blocked test case.
        test: String,
        /// Dependency that failed.
        dependency: String,
    },

    /// The checking tool did not finish within the configured timeout.
    #[error("checker for {test} timed out after {secs}s")]
    CheckerTimeout {
        /// Test case being checked.
        test: String,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The YAML manifest could not be parsed.
    #[error("manifest error: {source}")]
    Manifest {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl HarnessError {
    /// Shorthand for wrapping an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error invalidates the whole run rather than one test.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Directive { .. }
                | Self::Manifest { .. }
                | Self::NotFound { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_error_mentions_location() {
        let err = HarnessError::Directive {
            path: PathBuf::from("tests/base/Dockerfile"),
            line: 3,
            message: "no tags after marker".into(),
        };
        assert_eq!(
            err.to_string(),
            "tests/base/Dockerfile:3: invalid directive: no tags after marker"
        );
    }

    #[test]
    fn build_failure_is_not_configuration() {
        let err = HarnessError::BuildFailed {
            test: "base".into(),
            step: "build",
            status: 125,
            stderr: "no such image".into(),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("build of base failed"));
    }

    #[test]
    fn config_error_is_configuration() {
        let err = HarnessError::Config {
            message: "cycle".into(),
        };
        assert!(err.is_configuration());
    }
}
