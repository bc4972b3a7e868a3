//! `cbctest clean-artifacts`: Remove build markers and exported images.

use clap::Args;

use super::{GlobalArgs, Selection};
use crate::output;

/// Arguments for the `clean-artifacts` command.
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Also remove the tagged images from the container engine.
    #[arg(long)]
    pub images: bool,

    /// Tests to clean. Their dependencies are left alone.
    #[command(flatten)]
    pub selection: Selection,
}

/// Executes the `clean-artifacts` command.
///
/// # Errors
///
/// Returns an error if a selected test does not exist or an artifact cannot
/// be removed.
pub fn execute(global: &GlobalArgs, args: CleanArgs) -> anyhow::Result<()> {
    let pipeline = global.pipeline()?;
    let reports = pipeline.clean(&args.selection.names(), args.images)?;

    if global.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        output::print_clean(&reports);
    }
    if reports.iter().any(|r| r.error.is_some()) {
        std::process::exit(1);
    }
    Ok(())
}
