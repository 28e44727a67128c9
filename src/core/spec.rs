//! Typed records for a spec file.
//!
//! The raw TOML tree is converted once, right after loading, into the
//! records below so that shape errors surface before any formatting or
//! resolution begins. Top-level and record-level keys are case-folded the
//! same way the [`Context`](super::context::Context) folds them.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use super::context::RESERVED_PREFIX;

/// Top-level keys with structural meaning. Everything else that is a
/// scalar becomes a graph variable.
pub const SECTION_KEYS: &[&str] = &[
    "target", "plugin", "pool", "rule", "build", "default", "include", "subninja",
];

/// Errors raised while validating a spec file's shape.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to parse spec file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid `{section}` entry #{index}: {message}")]
    Shape {
        section: &'static str,
        index: usize,
        message: String,
    },

    #[error("`{section}` must be a table or a list of tables")]
    NotATable { section: &'static str },

    #[error("`{section}` must be a string or a list of strings")]
    NotAString { section: &'static str },

    #[error("{kind} name conflict: `{name}` is declared more than once")]
    Duplicate { kind: &'static str, name: String },

    #[error("`{key}` is declared more than once with different case")]
    KeyCollision { key: String },

    #[error("unknown target type `{kind}` for target `{target}` (expected executable, dynamic_library or static_library)")]
    UnknownTargetType { target: String, kind: String },
}

/// A parsed spec file.
#[derive(Debug, Clone, Default)]
pub struct SpecFile {
    /// The raw tree with top-level keys case-folded.
    pub raw: toml::Table,
    /// Declared targets, in declaration order.
    pub targets: Vec<TargetDecl>,
    /// User-declared plugins.
    pub plugins: Vec<PluginDecl>,
    /// Passthrough pools.
    pub pools: Vec<PoolDecl>,
    /// Passthrough rules.
    pub rules: Vec<RuleDecl>,
    /// Passthrough build edges.
    pub builds: Vec<BuildDecl>,
    /// Default targets.
    pub defaults: Vec<String>,
    /// Included spec or graph files.
    pub includes: Vec<String>,
    /// Subninja graph files.
    pub subninjas: Vec<String>,
}

impl SpecFile {
    /// Read and validate a spec file from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        if !path.is_file() {
            return Err(SpecError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read spec file: {}", path.display()))?;
        let raw: toml::Table = toml::from_str(&contents).map_err(|source| SpecError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_table(raw)?)
    }

    /// Validate an already-parsed tree.
    pub fn from_table(raw: toml::Table) -> Result<Self, SpecError> {
        let raw = fold_top_level(raw)?;

        Ok(SpecFile {
            targets: records(&raw, "target")?,
            plugins: records(&raw, "plugin")?,
            pools: records(&raw, "pool")?,
            rules: records(&raw, "rule")?,
            builds: records(&raw, "build")?,
            defaults: strings(&raw, "default", true)?,
            includes: strings(&raw, "include", false)?,
            subninjas: strings(&raw, "subninja", false)?,
            raw,
        })
    }

    /// Scalar top-level entries that become graph variables.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.raw
            .iter()
            .filter(|(k, v)| {
                !k.starts_with(RESERVED_PREFIX)
                    && !SECTION_KEYS.contains(&k.as_str())
                    && !matches!(v, toml::Value::Array(_) | toml::Value::Table(_))
            })
            .map(|(k, _)| k.as_str())
    }
}

/// A declared target, before conditions and formatting are applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "list_or_string")]
    pub sources: Vec<String>,
    #[serde(default, deserialize_with = "list_or_string")]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "list_or_string")]
    pub include_dirs: Vec<String>,
    #[serde(default, deserialize_with = "list_or_string")]
    pub defines: Vec<String>,
    #[serde(default, deserialize_with = "flags")]
    pub cflags: String,
    #[serde(default, deserialize_with = "flags")]
    pub cppflags: String,
    #[serde(default, deserialize_with = "flags")]
    pub asflags: String,
    #[serde(default, deserialize_with = "flags")]
    pub ldflags: String,
    #[serde(default, deserialize_with = "condition_list")]
    pub conditions: Vec<ConditionDecl>,
    /// Source pattern (regex) to rule chain, checked in declaration order.
    #[serde(default)]
    pub rule_map: IndexMap<String, String>,
}

/// One conditional override block of a target. Present fields replace the
/// target's when `condition` holds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionDecl {
    /// Boolean expression over platform facts.
    pub condition: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "opt_list_or_string")]
    pub sources: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_list_or_string")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_list_or_string")]
    pub include_dirs: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_list_or_string")]
    pub defines: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_flags")]
    pub cflags: Option<String>,
    #[serde(default, deserialize_with = "opt_flags")]
    pub cppflags: Option<String>,
    #[serde(default, deserialize_with = "opt_flags")]
    pub asflags: Option<String>,
    #[serde(default, deserialize_with = "opt_flags")]
    pub ldflags: Option<String>,
    pub rule_map: Option<IndexMap<String, String>>,
}

impl TargetDecl {
    /// Replace every field present in `overrides`.
    pub fn apply(&mut self, overrides: &ConditionDecl) {
        let o = overrides.clone();
        if let Some(v) = o.name {
            self.name = v;
        }
        if let Some(v) = o.kind {
            self.kind = v;
        }
        if let Some(v) = o.sources {
            self.sources = v;
        }
        if let Some(v) = o.dependencies {
            self.dependencies = v;
        }
        if let Some(v) = o.include_dirs {
            self.include_dirs = v;
        }
        if let Some(v) = o.defines {
            self.defines = v;
        }
        if let Some(v) = o.cflags {
            self.cflags = v;
        }
        if let Some(v) = o.cppflags {
            self.cppflags = v;
        }
        if let Some(v) = o.asflags {
            self.asflags = v;
        }
        if let Some(v) = o.ldflags {
            self.ldflags = v;
        }
        if let Some(v) = o.rule_map {
            self.rule_map = v;
        }
    }
}

/// A user-declared plugin backed by an external program.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginDecl {
    pub name: String,
    pub path: String,
}

/// A passthrough pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolDecl {
    pub name: String,
    #[serde(default = "default_depth")]
    pub depth: i64,
}

fn default_depth() -> i64 {
    1
}

/// A passthrough rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
    pub name: String,
    pub command: String,
    pub description: Option<String>,
    pub depfile: Option<String>,
    #[serde(default)]
    pub generator: bool,
    pub pool: Option<String>,
    #[serde(default)]
    pub restat: bool,
    pub rspfile: Option<String>,
    pub rspfile_content: Option<String>,
    pub deps: Option<String>,
}

/// A passthrough build edge.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildDecl {
    #[serde(deserialize_with = "list_or_string")]
    pub outputs: Vec<String>,
    #[serde(default = "default_rule")]
    pub rule: String,
    #[serde(default, deserialize_with = "list_or_string")]
    pub inputs: Vec<String>,
    #[serde(default, deserialize_with = "list_or_string")]
    pub implicit: Vec<String>,
    #[serde(default, deserialize_with = "list_or_string")]
    pub order_only: Vec<String>,
    #[serde(default, deserialize_with = "list_or_string")]
    pub implicit_outputs: Vec<String>,
    /// Remaining keys become edge-scoped variables.
    #[serde(flatten)]
    pub variables: IndexMap<String, toml::Value>,
}

fn default_rule() -> String {
    "phony".to_string()
}

// =============================================================================
// Shape helpers
// =============================================================================

/// Case-fold the top-level keys. Sections spelled with different case are
/// concatenated in file order; any other collision is an error.
fn fold_top_level(table: toml::Table) -> Result<toml::Table, SpecError> {
    let mut folded = toml::Table::new();
    for (key, value) in table {
        let key = key.to_lowercase();
        match folded.get_mut(&key) {
            None => {
                folded.insert(key, value);
            }
            Some(existing) if SECTION_KEYS.contains(&key.as_str()) => {
                let first = std::mem::replace(existing, toml::Value::Array(Vec::new()));
                *existing = concat_section(first, value);
            }
            Some(_) => return Err(SpecError::KeyCollision { key }),
        }
    }
    Ok(folded)
}

fn concat_section(first: toml::Value, second: toml::Value) -> toml::Value {
    let items = |value: toml::Value| match value {
        toml::Value::Array(items) => items,
        other => vec![other],
    };
    let mut merged = items(first);
    merged.extend(items(second));
    toml::Value::Array(merged)
}

fn fold_keys(table: toml::Table) -> toml::Table {
    table
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect()
}

fn records<T: for<'de> Deserialize<'de>>(
    raw: &toml::Table,
    section: &'static str,
) -> Result<Vec<T>, SpecError> {
    let entries = match raw.get(section) {
        None => return Ok(Vec::new()),
        Some(toml::Value::Table(t)) => vec![t.clone()],
        Some(toml::Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                toml::Value::Table(t) => Ok(t.clone()),
                _ => Err(SpecError::NotATable { section }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(SpecError::NotATable { section }),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, table)| {
            let table = fold_record(table);
            T::deserialize(toml::Value::Table(table)).map_err(|e| SpecError::Shape {
                section,
                index,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Fold record keys, and the keys of its `conditions` entries. `rule_map`
/// keys are patterns and keep their case.
fn fold_record(table: toml::Table) -> toml::Table {
    table
        .into_iter()
        .map(|(k, v)| {
            let k = k.to_lowercase();
            let v = match (k.as_str(), v) {
                ("conditions", toml::Value::Array(items)) => toml::Value::Array(
                    items
                        .into_iter()
                        .map(|item| match item {
                            toml::Value::Table(t) => toml::Value::Table(fold_keys(t)),
                            other => other,
                        })
                        .collect(),
                ),
                (_, v) => v,
            };
            (k, v)
        })
        .collect()
}

fn strings(
    raw: &toml::Table,
    section: &'static str,
    lenient: bool,
) -> Result<Vec<String>, SpecError> {
    match raw.get(section) {
        None => Ok(Vec::new()),
        Some(toml::Value::String(s)) => Ok(vec![s.clone()]),
        Some(toml::Value::Array(items)) => {
            let mut out = Vec::new();
            for item in items {
                match item {
                    toml::Value::String(s) => out.push(s.clone()),
                    _ if lenient => {}
                    _ => return Err(SpecError::NotAString { section }),
                }
            }
            Ok(out)
        }
        Some(_) if lenient => Ok(Vec::new()),
        Some(_) => Err(SpecError::NotAString { section }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_list(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) if s.is_empty() => Vec::new(),
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }

    fn into_flags(self) -> String {
        match self {
            OneOrMany::One(s) => s,
            OneOrMany::Many(v) => v.join(" "),
        }
    }
}

fn list_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    OneOrMany::deserialize(d)
        .map(OneOrMany::into_list)
        .map_err(|_| de::Error::custom("expected a string or a list of strings"))
}

fn opt_list_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    list_or_string(d).map(Some)
}

fn flags<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    OneOrMany::deserialize(d)
        .map(OneOrMany::into_flags)
        .map_err(|_| de::Error::custom("expected a flag string or a list of flags"))
}

fn opt_flags<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    flags(d).map(Some)
}

fn condition_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ConditionDecl>, D::Error> {
    let one = |value: toml::Value| ConditionDecl::deserialize(value).map_err(de::Error::custom);
    match toml::Value::deserialize(d)? {
        toml::Value::Array(items) => items.into_iter().map(one).collect(),
        other => one(other).map(|c| vec![c]),
    }
}
