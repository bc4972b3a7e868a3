//! Invocation of the checking tool.
//!
//! The tool runs inside the test directory with [`CONFIG_DIR_ENV`] pointing
//! at the shared configuration directory. Its stdout and stderr are attached
//! to the same pipe, so the captured stream keeps the order in which the tool
//! wrote it. A non-zero exit is an outcome, not an error: it is recorded in
//! the trailer line `Exited with <code>`.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use cbctest_common::constants::{CONFIG_DIR_ENV, TRAILER_PREFIX};
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::process::exit_code;
use cbctest_plan::TestCase;
use nix::fcntl::OFlag;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

/// Interval between exit polls while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Output of one checker run, trailer included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRun {
    text: String,
    exit_code: i32,
}

impl CapturedRun {
    /// Wraps merged tool output, appending the trailer line for `exit_code`.
    #[must_use]
    pub fn new(output: &[u8], exit_code: i32) -> Self {
        let mut text = String::from_utf8_lossy(output).into_owned();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        let _ = writeln!(text, "{TRAILER_PREFIX}{exit_code}");
        Self { text, exit_code }
    }

    /// Full captured text, ending with the trailer line.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Exit code of the tool.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

/// Runs the checking tool for a test case.
pub trait Checker: Send + Sync {
    /// Runs the tool in `case`'s directory and captures its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be started, its output cannot be
    /// read, or it exceeds the timeout. A non-zero exit is not an error.
    fn run(&self, case: &TestCase) -> Result<CapturedRun>;
}

/// Checker backed by an external executable.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    program: PathBuf,
    config_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandChecker {
    /// Creates a checker for `program`.
    ///
    /// Relative paths containing a separator are resolved against the current
    /// directory, since the tool runs from inside each test directory. A bare
    /// name is left for `PATH` lookup.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the current directory cannot be determined.
    pub fn new(program: &Path, config_dir: &Path, timeout: Option<Duration>) -> Result<Self> {
        let program = if program.components().count() > 1 {
            std::path::absolute(program).map_err(|e| HarnessError::io(program, e))?
        } else {
            program.to_path_buf()
        };
        let config_dir =
            std::path::absolute(config_dir).map_err(|e| HarnessError::io(config_dir, e))?;
        Ok(Self {
            program,
            config_dir,
            timeout,
        })
    }

    fn spawn(&self, workdir: &Path) -> Result<(Child, File)> {
        let spawn_error = |e: std::io::Error| HarnessError::Spawn {
            program: self.program.display().to_string(),
            source: e,
        };
        let (reader, writer) =
            nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| spawn_error(e.into()))?;
        let writer_err = writer.try_clone().map_err(spawn_error)?;

        // The command owns the write ends; dropping it right after spawning
        // leaves the tool's process group as the only writers, so the reader
        // sees EOF once they exit.
        let child = Command::new(&self.program)
            .current_dir(workdir)
            .env(CONFIG_DIR_ENV, &self.config_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(writer_err))
            .process_group(0)
            .spawn()
            .map_err(spawn_error)?;
        Ok((child, File::from(reader)))
    }

    fn wait(&self, child: &mut Child, case: &TestCase) -> Result<ExitStatus> {
        let wait_error = |e: std::io::Error| HarnessError::io(&case.dir, e);
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(wait_error);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                tracing::warn!(test = %case.name, secs = timeout.as_secs(), "checker timed out, killing");
                kill_group(child);
                let _ = child.wait();
                return Err(HarnessError::CheckerTimeout {
                    test: case.name.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Checker for CommandChecker {
    fn run(&self, case: &TestCase) -> Result<CapturedRun> {
        tracing::info!(
            test = %case.name,
            program = %self.program.display(),
            config_dir = %self.config_dir.display(),
            "running checker"
        );
        let (mut child, mut reader) = self.spawn(&case.dir)?;
        let collector = std::thread::spawn(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });

        let status = match self.wait(&mut child, case) {
            Ok(status) => status,
            Err(e) => {
                let _ = collector.join();
                return Err(e);
            }
        };
        let output = collector
            .join()
            .map_err(|_| HarnessError::io(&case.dir, std::io::Error::other("output reader panicked")))?
            .map_err(|e| HarnessError::io(&case.dir, e))?;

        let code = exit_code(status);
        tracing::info!(test = %case.name, exit_code = code, bytes = output.len(), "checker finished");
        Ok(CapturedRun::new(&output, code))
    }
}

/// Kills the process group led by `child`, falling back to the child alone.
fn kill_group(child: &mut Child) {
    let killed = i32::try_from(child.id())
        .is_ok_and(|pid| killpg(Pid::from_raw(pid), Signal::SIGKILL).is_ok());
    if !killed {
        let _ = child.kill();
    }
}
