//! `cbctest build-all`: Build the test images that are out of date.

use clap::Args;

use super::{GlobalArgs, Selection};
use crate::output;

/// Arguments for the `build-all` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Tests to build.
    #[command(flatten)]
    pub selection: Selection,
}

/// Executes the `build-all` command.
///
/// # Errors
///
/// Returns an error on a configuration problem. Failed builds are reported
/// and turn into a non-zero exit status.
pub fn execute(global: &GlobalArgs, args: BuildArgs) -> anyhow::Result<()> {
    let pipeline = global.pipeline()?;
    let report = pipeline.build_all(&args.selection.names())?;
    output::finish(&report, global.json)
}
