//! Shared utilities

pub mod config;
pub mod diagnostic;
pub mod fs;
pub mod process;
pub mod shell_words;

pub use config::GenerateOptions;
pub use diagnostic::Diagnostic;
pub use process::ProcessBuilder;
