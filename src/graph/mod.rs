//! Build-graph output.
//!
//! The planner never writes graph syntax itself; it drives a [`GraphSink`].
//! [`NinjaWriter`] renders ninja syntax, [`RecordingSink`] keeps the calls
//! in memory for dry runs and tests.

mod memory;
pub mod ninja;

use indexmap::IndexMap;
use serde::Serialize;

pub use memory::{GraphRecord, RecordingSink};
pub use ninja::NinjaWriter;

/// Optional attributes of a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleOptions {
    pub description: Option<String>,
    pub depfile: Option<String>,
    pub generator: bool,
    pub pool: Option<String>,
    pub restat: bool,
    pub rspfile: Option<String>,
    pub rspfile_content: Option<String>,
    pub deps: Option<String>,
}

/// Inputs and edge-scoped variables of a build edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildOptions {
    pub inputs: Vec<String>,
    pub implicit: Vec<String>,
    pub order_only: Vec<String>,
    pub implicit_outputs: Vec<String>,
    pub variables: IndexMap<String, String>,
}

impl BuildOptions {
    pub fn inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn implicit<I, S>(mut self, implicit: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implicit.extend(implicit.into_iter().map(Into::into));
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// Receiver of build-graph directives.
pub trait GraphSink {
    fn variable(&mut self, name: &str, value: &str);

    fn pool(&mut self, name: &str, depth: i64);

    fn rule(&mut self, name: &str, command: &str, options: &RuleOptions);

    fn build(&mut self, outputs: &[String], rule: &str, options: &BuildOptions);

    fn include(&mut self, path: &str);

    fn subninja(&mut self, path: &str);

    fn default(&mut self, names: &[String]);
}
