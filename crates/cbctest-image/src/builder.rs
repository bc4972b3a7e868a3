//! Build, export and describe one test image.

use std::path::PathBuf;

use cbctest_common::error::Result;
use cbctest_plan::TestCase;

use crate::engine::{BuildRequest, ContainerEngine};
use crate::metadata::{self, Descriptor};
use crate::tracker::remove_if_exists;

/// Artifacts produced by a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    /// Image reference the build was tagged with.
    pub image: String,
    /// Exported archive.
    pub archive: PathBuf,
    /// Descriptor written next to the archive, if metadata is enabled.
    pub descriptor: Option<Descriptor>,
}

/// Drives the container engine for test cases.
pub struct ImageBuilder {
    engine: Box<dyn ContainerEngine>,
    namespace: String,
    metadata: bool,
}

impl std::fmt::Debug for ImageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuilder")
            .field("engine", &self.engine.name())
            .field("namespace", &self.namespace)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ImageBuilder {
    /// Creates a builder tagging images under `namespace`.
    #[must_use]
    pub fn new(engine: Box<dyn ContainerEngine>, namespace: impl Into<String>, metadata: bool) -> Self {
        Self {
            engine,
            namespace: namespace.into(),
            metadata,
        }
    }

    /// Image reference of `case`.
    #[must_use]
    pub fn image_ref(&self, case: &TestCase) -> String {
        case.name.image_ref(&self.namespace)
    }

    /// Builds the image of `case`, exports it to `<test>.tar` and, with
    /// metadata enabled, writes `<test>.containerinfo`.
    ///
    /// Directives are parsed before the engine runs, so a malformed one
    /// fails without touching the image store.
    ///
    /// # Errors
    ///
    /// Returns `Directive` for malformed tag directives, `BuildFailed` if the
    /// engine rejects the build or export, or an I/O error.
    pub fn build(&self, case: &TestCase) -> Result<BuiltImage> {
        let descriptor = if self.metadata {
            Some(metadata::describe(case)?)
        } else {
            None
        };

        let image = self.image_ref(case);
        let request = BuildRequest {
            test: &case.name,
            image: image.clone(),
            disturl: case.name.disturl(),
            context: &case.dir,
        };
        self.engine.build(&request)?;

        let archive = case.archive();
        self.engine.save(&case.name, &image, &archive)?;

        match &descriptor {
            Some(d) => metadata::write_descriptor(case, d)?,
            None => remove_if_exists(&case.descriptor())?,
        }

        Ok(BuiltImage {
            image,
            archive,
            descriptor,
        })
    }

    /// Deletes the marker, archive and descriptor of `case`, and the image
    /// itself if `remove_image` is set. Returns the files that existed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be removed, or `BuildFailed` if
    /// the engine fails to remove the image.
    pub fn clean(&self, case: &TestCase, remove_image: bool) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for path in [case.marker(), case.archive(), case.descriptor()] {
            if path.exists() {
                remove_if_exists(&path)?;
                removed.push(path);
            }
        }
        if remove_image {
            self.remove_image(case)?;
        }
        tracing::info!(test = %case.name, files = removed.len(), remove_image, "cleaned artifacts");
        Ok(removed)
    }

    /// Removes the image of `case` from the engine's store.
    ///
    /// # Errors
    ///
    /// Returns `BuildFailed` if the engine fails to remove the image.
    pub fn remove_image(&self, case: &TestCase) -> Result<()> {
        self.engine.remove_image(&case.name, &self.image_ref(case))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use cbctest_common::error::HarnessError;
    use cbctest_common::types::TestName;

    use super::*;

    /// Records engine calls and writes a dummy archive on save.
    #[derive(Default, Clone)]
    struct RecordingEngine {
        calls: Arc<Mutex<Vec<String>>>,
        fail_build: bool,
    }

    impl ContainerEngine for RecordingEngine {
        fn build(&self, request: &BuildRequest<'_>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("build {} {}", request.image, request.disturl));
            if self.fail_build {
                return Err(HarnessError::BuildFailed {
                    test: request.test.to_string(),
                    step: "build",
                    status: 1,
                    stderr: String::new(),
                });
            }
            Ok(())
        }

        fn save(&self, _test: &TestName, image: &str, archive: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(format!("save {image}"));
            std::fs::write(archive, image).map_err(|e| HarnessError::io(archive, e))
        }

        fn remove_image(&self, _test: &TestName, image: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("rmi {image}"));
            Ok(())
        }

        fn name(&self) -> String {
            "recording".into()
        }
    }

    fn make_case(root: &Path, dockerfile: &str) -> TestCase {
        let dir = root.join("base");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Dockerfile"), dockerfile).unwrap();
        TestCase {
            name: "base".into(),
            dir,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn build_exports_archive_and_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "#!BuildTag base\nFROM scratch\n");
        let engine = RecordingEngine::default();
        let builder = ImageBuilder::new(Box::new(engine.clone()), "cbc-tests", true);

        let built = builder.build(&case).unwrap();
        assert_eq!(built.image, "cbc-tests/base");
        assert_eq!(std::fs::read_to_string(case.archive()).unwrap(), "cbc-tests/base");
        assert_eq!(built.descriptor.unwrap().tags, vec!["base:latest"]);
        assert!(case.descriptor().exists());
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![
                "build cbc-tests/base obs://container:build:checks/base",
                "save cbc-tests/base",
            ]
        );
    }

    #[test]
    fn metadata_disabled_removes_stale_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "FROM scratch\n");
        std::fs::write(case.descriptor(), "{}").unwrap();
        let builder = ImageBuilder::new(Box::new(RecordingEngine::default()), "ns", false);

        let built = builder.build(&case).unwrap();
        assert!(built.descriptor.is_none());
        assert!(!case.descriptor().exists());
    }

    #[test]
    fn bad_directive_fails_before_engine_runs() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "#!BuildTag\nFROM scratch\n");
        let engine = RecordingEngine::default();
        let builder = ImageBuilder::new(Box::new(engine.clone()), "ns", true);

        let err = builder.build(&case).unwrap_err();
        assert!(err.is_configuration());
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_build_does_not_export() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "FROM scratch\n");
        let engine = RecordingEngine {
            fail_build: true,
            ..RecordingEngine::default()
        };
        let builder = ImageBuilder::new(Box::new(engine.clone()), "ns", true);

        assert!(builder.build(&case).is_err());
        assert!(!case.archive().exists());
        assert!(!case.descriptor().exists());
        assert_eq!(engine.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn clean_removes_artifacts_and_optionally_image() {
        let root = tempfile::tempdir().unwrap();
        let case = make_case(root.path(), "FROM scratch\n");
        let engine = RecordingEngine::default();
        let builder = ImageBuilder::new(Box::new(engine.clone()), "ns", true);
        let _ = builder.build(&case).unwrap();
        std::fs::write(case.marker(), "{}").unwrap();

        let removed = builder.clean(&case, true).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(case.dockerfile().exists());
        assert!(!case.archive().exists());
        assert!(engine.calls.lock().unwrap().contains(&"rmi ns/base".to_string()));

        assert!(builder.clean(&case, false).unwrap().is_empty());
    }
}
