//! # cbctest-runner
//!
//! Runs the checking tool against built test images and holds its output
//! against the golden snapshots.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod checker;
pub mod compare;
pub mod pipeline;
pub mod report;
pub mod snapshot;

pub use checker::{CapturedRun, Checker, CommandChecker};
pub use compare::{Comparison, compare};
pub use pipeline::Pipeline;
pub use report::{RunReport, TestReport};
