//! In-memory graph sink.

use serde::Serialize;

use super::{BuildOptions, GraphSink, RuleOptions};

/// One recorded graph directive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphRecord {
    Variable {
        name: String,
        value: String,
    },
    Pool {
        name: String,
        depth: i64,
    },
    Rule {
        name: String,
        command: String,
        #[serde(flatten)]
        options: RuleOptions,
    },
    Build {
        outputs: Vec<String>,
        rule: String,
        #[serde(flatten)]
        options: BuildOptions,
    },
    Include {
        path: String,
    },
    Subninja {
        path: String,
    },
    Default {
        names: Vec<String>,
    },
}

/// Records every directive in call order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingSink {
    pub records: Vec<GraphRecord>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink {
            records: Vec::new(),
        }
    }

    /// Recorded build edges as `(outputs, rule, options)`.
    pub fn builds(&self) -> impl Iterator<Item = (&[String], &str, &BuildOptions)> {
        self.records.iter().filter_map(|r| match r {
            GraphRecord::Build {
                outputs,
                rule,
                options,
            } => Some((outputs.as_slice(), rule.as_str(), options)),
            _ => None,
        })
    }

    /// The edge producing `output`, if any.
    pub fn build_for(&self, output: &str) -> Option<(&str, &BuildOptions)> {
        self.builds()
            .find(|(outs, _, _)| outs.iter().any(|o| o == output))
            .map(|(_, rule, opts)| (rule, opts))
    }

    /// Recorded rule names, in order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| match r {
                GraphRecord::Rule { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replay the recorded directives onto another sink.
    pub fn replay(&self, sink: &mut dyn GraphSink) {
        for record in &self.records {
            match record {
                GraphRecord::Variable { name, value } => sink.variable(name, value),
                GraphRecord::Pool { name, depth } => sink.pool(name, *depth),
                GraphRecord::Rule {
                    name,
                    command,
                    options,
                } => sink.rule(name, command, options),
                GraphRecord::Build {
                    outputs,
                    rule,
                    options,
                } => sink.build(outputs, rule, options),
                GraphRecord::Include { path } => sink.include(path),
                GraphRecord::Subninja { path } => sink.subninja(path),
                GraphRecord::Default { names } => sink.default(names),
            }
        }
    }
}

impl GraphSink for RecordingSink {
    fn variable(&mut self, name: &str, value: &str) {
        self.records.push(GraphRecord::Variable {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn pool(&mut self, name: &str, depth: i64) {
        self.records.push(GraphRecord::Pool {
            name: name.to_string(),
            depth,
        });
    }

    fn rule(&mut self, name: &str, command: &str, options: &RuleOptions) {
        self.records.push(GraphRecord::Rule {
            name: name.to_string(),
            command: command.to_string(),
            options: options.clone(),
        });
    }

    fn build(&mut self, outputs: &[String], rule: &str, options: &BuildOptions) {
        self.records.push(GraphRecord::Build {
            outputs: outputs.to_vec(),
            rule: rule.to_string(),
            options: options.clone(),
        });
    }

    fn include(&mut self, path: &str) {
        self.records.push(GraphRecord::Include {
            path: path.to_string(),
        });
    }

    fn subninja(&mut self, path: &str) {
        self.records.push(GraphRecord::Subninja {
            path: path.to_string(),
        });
    }

    fn default(&mut self, names: &[String]) {
        self.records.push(GraphRecord::Default {
            names: names.to_vec(),
        });
    }
}
