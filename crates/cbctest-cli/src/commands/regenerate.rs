//! `cbctest regenerate-snapshots`: Accept the current checker output.

use clap::Args;

use super::{GlobalArgs, Selection};
use crate::output;

/// Arguments for the `regenerate-snapshots` command.
#[derive(Args, Debug)]
pub struct RegenerateArgs {
    /// Tests whose snapshots to rewrite.
    #[command(flatten)]
    pub selection: Selection,
}

/// Executes the `regenerate-snapshots` command.
///
/// # Errors
///
/// Returns an error on a configuration problem.
pub fn execute(global: &GlobalArgs, args: RegenerateArgs) -> anyhow::Result<()> {
    let pipeline = global.pipeline()?;
    let report = pipeline.regenerate(&args.selection.names())?;
    output::finish(&report, global.json)
}
