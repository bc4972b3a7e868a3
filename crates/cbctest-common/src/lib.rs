//! # cbctest-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the whole cbctest workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives every other crate builds on.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod process;
pub mod types;
