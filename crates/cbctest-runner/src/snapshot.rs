//! Golden snapshot storage.

use std::io::Write;
use std::path::Path;

use cbctest_common::error::{HarnessError, Result};

/// Reads a golden snapshot. A missing file reads as empty; with
/// `create_missing` an empty placeholder is written in its place.
///
/// # Errors
///
/// Returns an I/O error if an existing file cannot be read or the
/// placeholder cannot be created.
pub fn read_golden(path: &Path, create_missing: bool) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no golden snapshot, comparing against empty");
            if create_missing {
                std::fs::write(path, "").map_err(|e| HarnessError::io(path, e))?;
            }
            Ok(String::new())
        }
        Err(e) => Err(HarnessError::io(path, e)),
    }
}

/// Replaces the golden snapshot with `text` atomically.
///
/// # Errors
///
/// Returns an I/O error if the snapshot cannot be written.
pub fn write_golden(path: &Path, text: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| HarnessError::io(dir, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| HarnessError::io(tmp.path(), e))?;
    let _ = tmp
        .persist(path)
        .map_err(|e| HarnessError::io(path, e.error))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "updated golden snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_golden_reads_empty_and_creates_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expected_output");
        assert_eq!(read_golden(&path, true).unwrap(), "");
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn missing_golden_without_placeholder_stays_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expected_output");
        assert_eq!(read_golden(&path, false).unwrap(), "");
        assert!(!path.exists());
    }

    #[test]
    fn write_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expected_output");
        std::fs::write(&path, "old\nExited with 1\n").unwrap();
        write_golden(&path, "OK\nExited with 0\n").unwrap();
        assert_eq!(read_golden(&path, false).unwrap(), "OK\nExited with 0\n");
    }
}
