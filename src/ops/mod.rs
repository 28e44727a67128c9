//! High-level operations.
//!
//! This module contains the implementation of the assemblage commands.

pub mod build;
pub mod clean;
pub mod generate;
pub mod probe;

pub use build::build;
pub use clean::clean;
pub use generate::{generate, generate_graph, GenerateRequest, Generated, LoadedSpec};
pub use probe::probe;
