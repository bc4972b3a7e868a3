//! Test case discovery.

use std::path::{Path, PathBuf};

use cbctest_common::constants::DOCKERFILE;
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::TestName;

/// Lists every subdirectory of `tests_root` that holds a `Dockerfile`,
/// sorted by name.
///
/// # Errors
///
/// Returns `NotFound` if the tests root does not exist, or an I/O error if it
/// cannot be listed.
pub fn discover(tests_root: &Path) -> Result<Vec<(TestName, PathBuf)>> {
    if !tests_root.is_dir() {
        return Err(HarnessError::NotFound {
            kind: "tests root",
            id: tests_root.display().to_string(),
        });
    }

    let entries = std::fs::read_dir(tests_root).map_err(|e| HarnessError::io(tests_root, e))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HarnessError::io(tests_root, e))?;
        let dir = entry.path();
        if !dir.join(DOCKERFILE).is_file() {
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %dir.display(), "skipping test directory with non UTF-8 name");
            continue;
        };
        found.push((TestName::new(name), dir.clone()));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));

    tracing::debug!(root = %tests_root.display(), count = found.len(), "discovered test cases");
    Ok(found)
}
