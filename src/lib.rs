//! Assemblage - a meta-build generator for C and C++
//!
//! This crate reads a declarative `build.toml`, discovers the toolchain,
//! resolves target dependencies and writes a ninja build graph.

pub mod builder;
pub mod core;
pub mod graph;
pub mod ops;
pub mod plugins;
pub mod resolver;
pub mod util;

/// Test utilities for assemblage unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides project fixtures and fake compiler drivers.
#[cfg(test)]
pub mod test_support;

pub use builder::{PlanError, TargetPlanner, Toolchain};
pub use core::{Context, SpecFile, Target, TargetKind, Value};
pub use graph::{GraphSink, NinjaWriter, RecordingSink};
pub use plugins::{LibraryPlugin, PluginOutput, PluginRegistry};
pub use resolver::{DependencyError, DependencyResolver};
