//! # cbctest-image
//!
//! Turns test directories into image archives the checker can inspect.
//!
//! Handles:
//! - **Engine**: Driving `podman`/`docker` for `build`, `save` and `rmi`.
//! - **Context**: Enumerating build context files, newest mtime and digest.
//! - **Tracker**: Deciding whether an image is stale and writing markers.
//! - **Metadata**: `#!BuildTag` directives and the `.containerinfo` descriptor.
//! - **Builder**: The build, export and describe sequence for one test.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod builder;
pub mod context;
pub mod engine;
pub mod metadata;
pub mod tracker;

pub use builder::ImageBuilder;
pub use engine::{CliEngine, ContainerEngine, LazyEngine};
pub use tracker::{BuildTracker, Staleness};
