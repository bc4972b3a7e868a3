//! Fixed names, paths and values shared by the harness stages.

/// Build instructions file that marks a directory as a test case.
pub const DOCKERFILE: &str = "Dockerfile";

/// Marker file written after a successful build.
pub const BUILT_MARKER: &str = "built";

/// Golden snapshot of the checker output.
pub const GOLDEN_FILE: &str = "expected_output";

/// Extension of the exported image archive (`<test>.tar`).
pub const ARCHIVE_EXTENSION: &str = "tar";

/// Extension of the metadata descriptor read by the checker.
pub const DESCRIPTOR_EXTENSION: &str = "containerinfo";

/// Manifest declaring dependencies and settings, relative to the tests root.
pub const MANIFEST_FILE: &str = "harness.yaml";

/// Default tests root, relative to the working directory.
pub const DEFAULT_TESTS_ROOT: &str = "tests";

/// Default image namespace; images are tagged `<namespace>/<test>`.
pub const DEFAULT_NAMESPACE: &str = "cbc-tests";

/// Default checking tool executable.
pub const DEFAULT_CHECKER: &str = "container-build-checks";

/// Container engines tried, in order, when none is configured.
pub const ENGINE_CANDIDATES: &[&str] = &["podman", "docker"];

/// Environment variable naming the checker's configuration directory.
pub const CONFIG_DIR_ENV: &str = "CBC_CONFIG_DIR";

/// Prefix of the synthetic distribution URL passed as `DISTURL`.
pub const DISTURL_PREFIX: &str = "obs://container:build:checks/";

/// Build argument carrying the distribution URL.
pub const DISTURL_BUILD_ARG: &str = "DISTURL";

/// Directive marker for tag declarations in the Dockerfile.
pub const BUILD_TAG_MARKER: &str = "#!BuildTag";

/// Suffix given to tags that do not carry one.
pub const DEFAULT_TAG_SUFFIX: &str = "latest";

/// Placeholder repository entry in every descriptor.
pub const OBS_REPOSITORIES_URL: &str = "obsrepositories:/";

/// Release string in every descriptor.
pub const DESCRIPTOR_RELEASE: &str = "1.2";

/// Version string in every descriptor.
pub const DESCRIPTOR_VERSION: &str = "42.0";

/// Prefix of the synthetic last line of every captured run.
pub const TRAILER_PREFIX: &str = "Exited with ";

/// Harness-generated files that never count as build context.
#[must_use]
pub fn is_generated_artifact(test: &str, file_name: &str) -> bool {
    file_name == BUILT_MARKER
        || file_name == GOLDEN_FILE
        || file_name == format!("{test}.{ARCHIVE_EXTENSION}")
        || file_name == format!("{test}.{DESCRIPTOR_EXTENSION}")
}
