//! CLI command definitions and dispatch.

pub mod build;
pub mod clean;
pub mod regenerate;

use std::path::PathBuf;

use anyhow::Context;
use cbctest_common::config::{ConfigOverrides, HarnessConfig};
use cbctest_common::constants::DEFAULT_TESTS_ROOT;
use cbctest_common::types::{Freshness, TestName};
use cbctest_plan::manifest::load_manifest;
use cbctest_runner::Pipeline;
use clap::{Parser, Subcommand, ValueEnum};

/// Build and regression-test harness for container-build-checks.
#[derive(Parser, Debug)]
#[command(name = "cbctest", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Flags shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags shared by every subcommand. They take precedence over the
/// `settings` section of the tests manifest.
#[derive(clap::Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding one subdirectory per test case.
    #[arg(long, global = true, env = "CBCTEST_TESTS_ROOT", default_value = DEFAULT_TESTS_ROOT)]
    pub tests_root: PathBuf,

    /// Configuration directory passed to the checker (defaults to the tests root).
    #[arg(long, global = true, env = "CBCTEST_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Container engine executable (defaults to podman, then docker).
    #[arg(long, global = true, env = "CBCTEST_ENGINE")]
    pub engine: Option<String>,

    /// Namespace test images are tagged under.
    #[arg(long, global = true, env = "CBCTEST_NAMESPACE")]
    pub namespace: Option<String>,

    /// Checking tool executable.
    #[arg(long, global = true, env = "CBCTEST_CHECKER")]
    pub checker: Option<PathBuf>,

    /// Do not write `.containerinfo` descriptors.
    #[arg(long, global = true, env = "CBCTEST_NO_METADATA")]
    pub no_metadata: bool,

    /// How to decide whether an image is stale.
    #[arg(long, global = true, value_enum, env = "CBCTEST_FRESHNESS")]
    pub freshness: Option<FreshnessArg>,

    /// Kill the checker after this many seconds.
    #[arg(long, global = true, env = "CBCTEST_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Rebuild every selected image regardless of freshness.
    #[arg(long, global = true, env = "CBCTEST_FORCE")]
    pub force: bool,

    /// Print the report as JSON on stdout.
    #[arg(long, global = true, env = "CBCTEST_JSON")]
    pub json: bool,
}

/// Staleness policy as accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessArg {
    /// Rebuild when a context file is newer than the build marker.
    Mtime,
    /// Rebuild when the digest of the context contents changed.
    Content,
}

impl From<FreshnessArg> for Freshness {
    fn from(arg: FreshnessArg) -> Self {
        match arg {
            FreshnessArg::Mtime => Self::Mtime,
            FreshnessArg::Content => Self::Content,
        }
    }
}

impl GlobalArgs {
    /// Command-line configuration layer.
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_dir: self.config_dir.clone(),
            engine: self.engine.clone(),
            namespace: self.namespace.clone(),
            checker: self.checker.clone(),
            metadata: self.no_metadata.then_some(false),
            freshness: self.freshness.map(Freshness::from),
            timeout_secs: self.timeout,
            force: self.force.then_some(true),
        }
    }

    /// Loads the manifest and the pipeline configured by defaults, then the
    /// manifest settings, then these flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is invalid, the suite cannot be
    /// loaded, or no container engine is available.
    pub fn pipeline(&self) -> anyhow::Result<Pipeline> {
        let manifest = load_manifest(&self.tests_root)
            .with_context(|| format!("loading manifest from {}", self.tests_root.display()))?;
        let config = HarnessConfig {
            tests_root: self.tests_root.clone(),
            ..HarnessConfig::default()
        }
        .with_overrides(&manifest.settings)
        .with_overrides(&self.overrides());
        tracing::debug!(?config, "resolved configuration");

        Pipeline::from_config(&config, &manifest).context("setting up the test pipeline")
    }
}

/// Test names given on the command line.
#[derive(clap::Args, Debug)]
pub struct Selection {
    /// Tests to operate on, plus their dependencies. Defaults to all tests.
    pub tests: Vec<String>,
}

impl Selection {
    /// The selected tests as names.
    pub fn names(&self) -> Vec<TestName> {
        self.tests.iter().map(|t| TestName::new(t.as_str())).collect()
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the test images that are out of date.
    BuildAll(build::BuildArgs),
    /// Build, check and compare against the golden snapshots.
    RunTests(test::RunTestsArgs),
    /// Build, check and overwrite the golden snapshots.
    RegenerateSnapshots(regenerate::RegenerateArgs),
    /// Delete build markers, archives and descriptors.
    CleanArtifacts(clean::CleanArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::BuildAll(args) => build::execute(&cli.global, args),
        Command::RunTests(args) => test::execute(&cli.global, args),
        Command::RegenerateSnapshots(args) => regenerate::execute(&cli.global, args),
        Command::CleanArtifacts(args) => clean::execute(&cli.global, args),
    }
}
