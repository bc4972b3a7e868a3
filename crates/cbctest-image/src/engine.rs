//! Container engine abstraction.
//!
//! The harness only needs three engine operations, all driven through the
//! engine's command line:
//!
//! ```text
//! <engine> build --squash -t <image> --build-arg DISTURL=<url> <context>
//! <engine> save <image> > <archive>
//! <engine> rmi -f <image>
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;

use cbctest_common::constants::{DISTURL_BUILD_ARG, ENGINE_CANDIDATES};
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::process::exit_code;
use cbctest_common::types::TestName;

/// Lines of engine error output kept in a build failure.
const STDERR_TAIL_LINES: usize = 20;

/// Everything the engine needs to build one test image.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Test being built, for error reporting.
    pub test: &'a TestName,
    /// Image reference to tag the result with.
    pub image: String,
    /// Value of the `DISTURL` build argument.
    pub disturl: String,
    /// Build context directory.
    pub context: &'a Path,
}

/// Platform-agnostic container engine.
pub trait ContainerEngine: Send + Sync {
    /// Builds and tags a squashed image.
    ///
    /// # Errors
    ///
    /// Returns `BuildFailed` if the engine exits non-zero.
    fn build(&self, request: &BuildRequest<'_>) -> Result<()>;

    /// Exports `image` to `archive`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns `BuildFailed` if the engine exits non-zero; no archive is left
    /// behind in that case.
    fn save(&self, test: &TestName, image: &str, archive: &Path) -> Result<()>;

    /// Removes `image` from the local image store.
    ///
    /// # Errors
    ///
    /// Returns `BuildFailed` if the engine exits non-zero.
    fn remove_image(&self, test: &TestName, image: &str) -> Result<()>;

    /// Short name used in logs.
    fn name(&self) -> String;
}

/// Arguments of the `build` invocation.
#[must_use]
pub fn build_args(request: &BuildRequest<'_>) -> Vec<OsString> {
    vec![
        "build".into(),
        "--squash".into(),
        "-t".into(),
        request.image.clone().into(),
        "--build-arg".into(),
        format!("{DISTURL_BUILD_ARG}={}", request.disturl).into(),
        request.context.as_os_str().to_os_string(),
    ]
}

/// Engine driven through its command-line interface.
#[derive(Debug, Clone)]
pub struct CliEngine {
    program: PathBuf,
}

impl CliEngine {
    /// Uses the given engine executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses `configured` if set, otherwise the first of `podman`, `docker`
    /// found in `search_path`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if nothing is configured and no engine is
    /// installed.
    pub fn detect(configured: Option<&str>, search_path: Option<&OsStr>) -> Result<Self> {
        if let Some(program) = configured {
            return Ok(Self::new(program));
        }
        let cwd = std::env::current_dir().map_err(|e| HarnessError::io(".", e))?;
        for candidate in ENGINE_CANDIDATES {
            if let Ok(path) = which::which_in(candidate, search_path, &cwd) {
                tracing::debug!(engine = %path.display(), "detected container engine");
                return Ok(Self::new(path));
            }
        }
        Err(HarnessError::Config {
            message: format!(
                "no container engine found on PATH (tried {})",
                ENGINE_CANDIDATES.join(", ")
            ),
        })
    }

    /// Engine executable.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, test: &TestName, step: &'static str, command: &mut Command) -> Result<Output> {
        let output = command.output().map_err(|e| HarnessError::Spawn {
            program: self.program.display().to_string(),
            source: e,
        })?;
        if output.status.success() {
            return Ok(output);
        }
        Err(HarnessError::BuildFailed {
            test: test.to_string(),
            step,
            status: exit_code(output.status),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

impl ContainerEngine for CliEngine {
    fn build(&self, request: &BuildRequest<'_>) -> Result<()> {
        tracing::info!(test = %request.test, image = %request.image, "building image");
        let output = self.run(
            request.test,
            "build",
            Command::new(&self.program)
                .args(build_args(request))
                .stdin(Stdio::null()),
        )?;
        tracing::debug!(
            test = %request.test,
            output = %String::from_utf8_lossy(&output.stdout),
            "engine build output"
        );
        Ok(())
    }

    fn save(&self, test: &TestName, image: &str, archive: &Path) -> Result<()> {
        tracing::info!(test = %test, image, archive = %archive.display(), "saving image");
        let dir = archive.parent().unwrap_or_else(|| Path::new("."));
        let partial = tempfile::NamedTempFile::new_in(dir).map_err(|e| HarnessError::io(dir, e))?;
        let sink = partial
            .as_file()
            .try_clone()
            .map_err(|e| HarnessError::io(partial.path(), e))?;

        let _ = self.run(
            test,
            "save",
            Command::new(&self.program)
                .args(["save", image])
                .stdin(Stdio::null())
                .stdout(Stdio::from(sink)),
        )?;

        let _ = partial
            .persist(archive)
            .map_err(|e| HarnessError::io(archive, e.error))?;
        Ok(())
    }

    fn remove_image(&self, test: &TestName, image: &str) -> Result<()> {
        tracing::info!(test = %test, image, "removing image");
        let _ = self.run(
            test,
            "rmi",
            Command::new(&self.program)
                .args(["rmi", "-f", image])
                .stdin(Stdio::null()),
        )?;
        Ok(())
    }

    fn name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Engine resolved on first use, so commands that never build or remove an
/// image work without one installed.
#[derive(Debug)]
pub struct LazyEngine {
    configured: Option<String>,
    search_path: Option<OsString>,
    resolved: OnceLock<CliEngine>,
}

impl LazyEngine {
    /// Uses `configured` if set, otherwise looks the engine up on `PATH`.
    #[must_use]
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured,
            search_path: std::env::var_os("PATH"),
            resolved: OnceLock::new(),
        }
    }

    /// Searches `search_path` instead of the process `PATH`.
    #[must_use]
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    fn resolve(&self) -> Result<&CliEngine> {
        if let Some(engine) = self.resolved.get() {
            return Ok(engine);
        }
        let engine = CliEngine::detect(self.configured.as_deref(), self.search_path.as_deref())?;
        tracing::info!(engine = %engine.program().display(), "using container engine");
        Ok(self.resolved.get_or_init(|| engine))
    }
}

impl ContainerEngine for LazyEngine {
    fn build(&self, request: &BuildRequest<'_>) -> Result<()> {
        self.resolve()?.build(request)
    }

    fn save(&self, test: &TestName, image: &str, archive: &Path) -> Result<()> {
        self.resolve()?.save(test, image, archive)
    }

    fn remove_image(&self, test: &TestName, image: &str) -> Result<()> {
        self.resolve()?.remove_image(test, image)
    }

    fn name(&self) -> String {
        match (self.resolved.get(), &self.configured) {
            (Some(engine), _) => engine.name(),
            (None, Some(configured)) => CliEngine::new(configured).name(),
            (None, None) => "auto".into(),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
