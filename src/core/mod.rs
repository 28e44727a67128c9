//! Core data structures for assemblage.
//!
//! This module contains the foundational types used throughout the crate:
//! - The templating context and its values
//! - Typed spec records
//! - Targets and their output naming
//! - Platform facts and condition expressions

pub mod condition;
pub mod context;
pub mod spec;
pub mod target;
pub mod value;

pub use condition::{ConditionError, PlatformFacts};
pub use context::{Context, ContextError, INCLUDE_PATH_KEY, RESERVED_PREFIX};
pub use spec::{SpecError, SpecFile, TargetDecl};
pub use target::{Target, TargetKind};
pub use value::Value;
