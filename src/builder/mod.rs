//! Toolchain discovery and target planning.
//!
//! `toolchain` finds the compiler, archiver and linker and discovers the
//! flags they always need. `plan` turns declared targets into build edges
//! using the per-source chains from `rule_chain`.

pub mod plan;
pub mod rule_chain;
pub mod toolchain;

pub use plan::{PlanError, PlannedTarget, TargetPlanner};
pub use rule_chain::{RuleChain, RuleMap};
pub use toolchain::{ProbeError, Toolchain};
