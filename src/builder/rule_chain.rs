//! Per-source rule chains.
//!
//! A chain is a `|`-separated list of `rule[:suffix]` stages, e.g.
//! `__cc_s:.s|__as_c:.o`. Each stage consumes the previous stage's output
//! and appends its suffix (default `.o`) to the source's temp path.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

/// Default output suffix of a stage.
pub const DEFAULT_SUFFIX: &str = ".o";

/// C sources.
pub const C_PATTERN: &str = r"\.c$";
/// C++ sources.
pub const CPP_PATTERN: &str = r"\.(cc|cpp|cxx|c\+\+|C)$";

static CPP_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CPP_PATTERN).expect("valid C++ pattern"));

#[derive(Debug, Error)]
pub enum RuleChainError {
    #[error("invalid rule_map pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("empty stage in rule chain `{chain}`")]
    EmptyStage { chain: String },
}

/// One build edge of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub rule: String,
    pub suffix: String,
}

/// A parsed rule chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChain {
    stages: Vec<Stage>,
}

impl RuleChain {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

impl FromStr for RuleChain {
    type Err = RuleChainError;

    fn from_str(chain: &str) -> Result<Self, Self::Err> {
        let stages = chain
            .split('|')
            .map(|part| {
                let (rule, suffix) = match part.split_once(':') {
                    Some((rule, suffix)) => (rule.trim(), suffix.trim()),
                    None => (part.trim(), DEFAULT_SUFFIX),
                };
                if rule.is_empty() {
                    return Err(RuleChainError::EmptyStage {
                        chain: chain.to_string(),
                    });
                }
                Ok(Stage {
                    rule: rule.to_string(),
                    suffix: suffix.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleChain { stages })
    }
}

impl fmt::Display for RuleChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .stages
            .iter()
            .map(|s| format!("{}:{}", s.rule, s.suffix))
            .collect();
        write!(f, "{}", parts.join("|"))
    }
}

/// Source pattern to chain, custom entries first.
#[derive(Debug, Clone)]
pub struct RuleMap {
    entries: Vec<(Regex, RuleChain)>,
}

impl RuleMap {
    /// Built-in C and C++ chains. With an assemble stage, sources compile
    /// to assembly and are assembled separately.
    pub fn builtin(assemble_stage: bool) -> Self {
        let (c, cpp) = if assemble_stage {
            ("__cc_s:.s|__as_c:.o", "__cpp_s:.s|__as_cpp:.o")
        } else {
            ("__cc", "__cpp")
        };
        let entries = [(C_PATTERN, c), (CPP_PATTERN, cpp)]
            .into_iter()
            .filter_map(|(pattern, chain)| Some((Regex::new(pattern).ok()?, chain.parse().ok()?)))
            .collect();
        RuleMap { entries }
    }

    /// A target's `rule_map` in declaration order, then the built-ins.
    pub fn with_custom(
        custom: &IndexMap<String, String>,
        assemble_stage: bool,
    ) -> Result<Self, RuleChainError> {
        let mut entries = Vec::with_capacity(custom.len() + 2);
        for (pattern, chain) in custom {
            let regex = Regex::new(pattern).map_err(|source| RuleChainError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            entries.push((regex, chain.parse()?));
        }
        entries.extend(RuleMap::builtin(assemble_stage).entries);
        Ok(RuleMap { entries })
    }

    /// The chain for a source path.
    pub fn select(&self, path: &str) -> Option<&RuleChain> {
        self.entries
            .iter()
            .find(|(regex, _)| regex.is_match(path))
            .map(|(_, chain)| chain)
    }
}

/// Whether a path names a C++ source.
pub fn is_cpp_source(path: &str) -> bool {
    CPP_SOURCE.is_match(path)
}
