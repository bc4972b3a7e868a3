//! # cbctest-plan
//!
//! Works out *what* a harness run touches and in which order.
//!
//! Handles:
//! - **Discovery**: Scanning the tests root for directories with a `Dockerfile`.
//! - **Manifest**: Loading `harness.yaml` (settings and declared dependencies).
//! - **Graph**: Dependency graph construction and topological resolution.
//! - **Suite**: Validated test cases and per-run build plans.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod discovery;
pub mod graph;
pub mod manifest;
pub mod suite;

pub use suite::{Plan, TestCase, TestSuite};
