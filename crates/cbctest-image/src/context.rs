//! Build context inspection.
//!
//! The context of a test is every regular file under its directory, except
//! the files the harness itself writes there (marker, archive, descriptor,
//! golden snapshot).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use cbctest_common::constants::is_generated_artifact;
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::TestName;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Lists the context files of `test`, sorted by path.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be walked.
pub fn context_files(dir: &Path, test: &TestName) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            HarnessError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.depth() == 1
            && is_generated_artifact(test.as_str(), &entry.file_name().to_string_lossy())
        {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Modification time of the most recently changed context file.
///
/// # Errors
///
/// Returns an I/O error if a file's metadata cannot be read.
pub fn newest_mtime(dir: &Path, test: &TestName) -> Result<Option<SystemTime>> {
    let mut newest = None;
    for file in context_files(dir, test)? {
        let modified = modified(&file)?;
        if newest.is_none_or(|n| modified > n) {
            newest = Some(modified);
        }
    }
    Ok(newest)
}

/// SHA-256 over the relative path and bytes of every context file, followed
/// by the digests of the dependencies, hex encoded.
///
/// # Errors
///
/// Returns an I/O error if a context file cannot be read.
pub fn context_digest(
    dir: &Path,
    test: &TestName,
    dependencies: &[(TestName, String)],
) -> Result<String> {
    let mut hasher = Sha256::new();
    for file in context_files(dir, test)? {
        let relative = file.strip_prefix(dir).unwrap_or(&file);
        let bytes = std::fs::read(&file).map_err(|e| HarnessError::io(&file, e))?;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    for (name, digest) in dependencies {
        hasher.update(b"dep:");
        hasher.update(name.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(digest.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Modification time of a single file.
///
/// # Errors
///
/// Returns an I/O error if the metadata cannot be read.
pub fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| HarnessError::io(path, e))
}
