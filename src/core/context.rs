//! Case-insensitive, lazily formatted key/value store.
//!
//! Every string read out of a [`Context`] is run through [`Context::format`],
//! which expands placeholders against the context's own keys and the process
//! environment:
//!
//! - `{name}` is replaced by the value stored under `name`.
//! - `{func:name}` applies a formatting function (`basename`, `dirname`,
//!   `noext`, `ext`, or a registered one) to the raw value of `name`.
//! - `{{` and `}}` produce literal braces.
//!
//! Keys are case-folded on every access, so `{PATH}`, `{path}` and
//! `{Path}` all name the same entry.
//!
//! Environment variables are written into the lookup table *after* the
//! context's own keys, so an environment variable shadows a same-named
//! context key. Existing specs rely on this order.

use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::{Captures, Regex};
use thiserror::Error;

use super::value::Value;

/// A formatting function usable as `{func:key}`.
pub type FormatFn = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Prefix marking internal keys that are never emitted into the graph.
pub const RESERVED_PREFIX: &str = "__";

/// Key holding the absolute path of the spec file being generated.
pub const INCLUDE_PATH_KEY: &str = "___include_toml_path";

static FUNC_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^:}]+):([^:}]+)\}").expect("valid placeholder regex"));

static ANY_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("valid placeholder regex"));

/// Errors raised while formatting text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContextError {
    #[error("unresolved placeholder `{{{name}}}` in `{text}`")]
    Unresolved { name: String, text: String },

    #[error("placeholder `{{{placeholder}}}` names an unknown function or key in `{text}`")]
    UnknownFunction { placeholder: String, text: String },

    #[error("placeholder `{{{name}}}` refers to a {kind}, which cannot be substituted into text")]
    NotText { name: String, kind: &'static str },

    #[error("unmatched `{brace}` in `{text}`")]
    UnmatchedBrace { brace: char, text: String },

    #[error("empty placeholder `{{}}` in `{text}`")]
    EmptyPlaceholder { text: String },
}

/// A nested, case-insensitive key/value store with a built-in formatter.
pub struct Context {
    data: IndexMap<String, Value>,
    functions: IndexMap<String, FormatFn>,
}

impl Context {
    /// Create an empty context with the built-in formatting functions.
    pub fn new() -> Self {
        Context {
            data: IndexMap::new(),
            functions: builtin_functions(),
        }
    }

    /// Build a context from a parsed TOML table. Nested tables become
    /// nested contexts.
    pub fn from_toml(table: toml::Table) -> Self {
        let mut ctx = Context::new();
        for (key, value) in table {
            ctx.set(&key, Value::from(value));
        }
        ctx
    }

    /// Check whether a key exists (case-insensitive).
    pub fn has(&self, name: &str) -> bool {
        self.data.contains_key(&name.to_lowercase())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the context holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the (lower-case) keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Store a value. Lazy values are kept as functions and invoked on read.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.data.insert(name.to_lowercase(), value.into());
    }

    /// Register a zero-argument function evaluated on every read of `name`.
    pub fn set_lazy<F>(&mut self, name: &str, f: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.set(name, Value::lazy(f));
    }

    /// Remove a key, returning its resolved (unformatted) value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.data
            .shift_remove(&name.to_lowercase())
            .map(|v| v.resolve())
    }

    /// Register a formatting function usable as `{name:key}`.
    pub fn register_func<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_lowercase(), Arc::new(f));
    }

    /// Read a value with lazy functions resolved but strings left raw.
    pub fn get_raw(&self, name: &str) -> Option<Value> {
        self.data.get(&name.to_lowercase()).map(Value::resolve)
    }

    /// Read a value. Lazy functions are invoked and strings are formatted.
    pub fn get(&self, name: &str) -> Result<Option<Value>, ContextError> {
        match self.get_raw(name) {
            Some(Value::Str(s)) => Ok(Some(Value::Str(self.format(&s)?))),
            other => Ok(other),
        }
    }

    /// Read a value as formatted text. Non-text values yield `None`.
    pub fn get_str(&self, name: &str) -> Result<Option<String>, ContextError> {
        match self.get(name)? {
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(v) if v.is_scalar() => Ok(v.to_text()),
            _ => Ok(None),
        }
    }

    /// Read formatted text, falling back to `default` when absent.
    pub fn get_str_or(&self, name: &str, default: &str) -> Result<String, ContextError> {
        Ok(self.get_str(name)?.unwrap_or_else(|| default.to_string()))
    }

    /// Read a boolean flag, `false` when absent or not boolean-like.
    pub fn get_bool(&self, name: &str) -> Result<bool, ContextError> {
        Ok(self
            .get(name)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Read text, storing `default` first when the key is absent.
    pub fn get_or_insert(&mut self, name: &str, default: &str) -> Result<String, ContextError> {
        if !self.has(name) {
            self.set(name, default);
        }
        self.get_str_or(name, default)
    }

    /// Overlay every key of `other` onto this context (incoming keys win).
    pub fn merge(&mut self, other: &Context) -> &mut Self {
        for (key, value) in &other.data {
            self.data.insert(key.to_lowercase(), value.clone());
        }
        self
    }

    /// Overlay key/value pairs onto this context (incoming keys win).
    pub fn merge_values<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in values {
            self.set(key.as_ref(), value);
        }
        self
    }

    /// Iterate over reserved (`__`-prefixed) entries.
    pub fn reserved(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data
            .iter()
            .filter(|(k, _)| k.starts_with(RESERVED_PREFIX))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over non-reserved entries with lazy values resolved.
    pub fn variables(&self) -> impl Iterator<Item = (&str, Value)> {
        self.data
            .iter()
            .filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
            .map(|(k, v)| (k.as_str(), v.resolve()))
    }

    /// Build the context for an included spec file.
    ///
    /// The child starts from the included file's own data, receives every
    /// reserved key of `self`, and records the included file's path.
    pub fn child(&self, included: Context, include_path: &str) -> Context {
        let mut child = included;
        for (key, value) in self.reserved() {
            child.data.insert(key.to_string(), value.clone());
        }
        child.set(INCLUDE_PATH_KEY, include_path);
        child
    }

    /// Format every string inside a value. Lists are formatted element-wise;
    /// other values are returned with lazy functions resolved.
    pub fn format_value(&self, value: &Value) -> Result<Value, ContextError> {
        match value.resolve() {
            Value::Str(s) => Ok(Value::Str(self.format(&s)?)),
            Value::List(items) => items
                .iter()
                .map(|item| self.format_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Ok(other),
        }
    }

    /// Expand all placeholders in `text`.
    pub fn format(&self, text: &str) -> Result<String, ContextError> {
        let table = self.lookup_table();

        // Two-part `{func:key}` placeholders first. Unknown functions or
        // keys leave the matched text untouched.
        let expanded = FUNC_PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let func_name = caps[1].to_lowercase();
            let key = caps[2].to_lowercase();
            let raw = table.get(&key).and_then(Value::to_text);
            match (self.functions.get(&func_name), raw) {
                (Some(func), Some(raw)) => func(&raw).unwrap_or(raw),
                _ => caps[0].to_string(),
            }
        });

        let lowered = ANY_PLACEHOLDER.replace_all(&expanded, |caps: &Captures<'_>| {
            caps[0].to_lowercase()
        });

        substitute(&lowered, &table, text)
    }

    fn lookup_table(&self) -> IndexMap<String, Value> {
        let mut table: IndexMap<String, Value> = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.resolve()))
            .collect();
        for (key, value) in std::env::vars_os() {
            if let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) {
                table.insert(key.to_lowercase(), Value::Str(value));
            }
        }
        table
    }
}

/// Replace `{name}` placeholders in a single pass. `original` is only used
/// for error messages.
fn substitute(
    text: &str,
    table: &IndexMap<String, Value>,
    original: &str,
) -> Result<String, ContextError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let brace = rest.as_bytes()[pos] as char;
        let after = &rest[pos + 1..];

        if after.starts_with(brace) {
            out.push(brace);
            rest = &after[1..];
            continue;
        }
        if brace == '}' {
            return Err(ContextError::UnmatchedBrace {
                brace,
                text: original.to_string(),
            });
        }

        let Some(end) = after.find('}') else {
            return Err(ContextError::UnmatchedBrace {
                brace,
                text: original.to_string(),
            });
        };
        let name = &after[..end];
        out.push_str(&lookup(name, table, original)?);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Resolve one placeholder body: `key`, `key.sub`, or `key[index]`.
fn lookup(
    name: &str,
    table: &IndexMap<String, Value>,
    original: &str,
) -> Result<String, ContextError> {
    if name.is_empty() {
        return Err(ContextError::EmptyPlaceholder {
            text: original.to_string(),
        });
    }
    if name.contains(':') {
        return Err(ContextError::UnknownFunction {
            placeholder: name.to_string(),
            text: original.to_string(),
        });
    }

    let unresolved = || ContextError::Unresolved {
        name: name.to_string(),
        text: original.to_string(),
    };

    let mut segments = split_field(name).into_iter();
    let head = segments.next().ok_or_else(unresolved)?;
    let mut current = match head {
        Segment::Key(key) => table.get(key).cloned().ok_or_else(unresolved)?,
        Segment::Index(_) => return Err(unresolved()),
    };

    for segment in segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Table(ctx)) => ctx
                .get(key)
                .map_err(|_| unresolved())?
                .ok_or_else(unresolved)?,
            (Segment::Index(i), Value::List(items)) => {
                items.get(i).map(Value::resolve).ok_or_else(unresolved)?
            }
            _ => return Err(unresolved()),
        };
    }

    current.to_text().ok_or_else(|| ContextError::NotText {
        name: name.to_string(),
        kind: current.kind(),
    })
}

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn split_field(name: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    for part in name.split('.') {
        let (key, mut indices) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }
        while let Some(close) = indices.find(']') {
            let index = &indices[1..close];
            match index.parse() {
                Ok(i) => segments.push(Segment::Index(i)),
                Err(_) => segments.push(Segment::Key(index)),
            }
            indices = &indices[close + 1..];
        }
    }
    segments
}

// =============================================================================
// Built-in formatting functions
// =============================================================================

fn builtin_functions() -> IndexMap<String, FormatFn> {
    let mut functions: IndexMap<String, FormatFn> = IndexMap::new();
    functions.insert("basename".into(), Arc::new(|p: &str| Ok(basename(p).to_string())));
    functions.insert("dirname".into(), Arc::new(|p: &str| Ok(dirname(p).to_string())));
    functions.insert("noext".into(), Arc::new(|p: &str| Ok(noext(p).to_string())));
    functions.insert("ext".into(), Arc::new(|p: &str| ext(p).map(str::to_string)));
    functions
}

fn is_separator(c: char) -> bool {
    c == '/' || c == std::path::MAIN_SEPARATOR
}

/// Final path component; empty when the path ends in a separator.
pub fn basename(path: &str) -> &str {
    match path.rfind(is_separator) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Everything before the final component, without trailing separators.
pub fn dirname(path: &str) -> &str {
    let Some(i) = path.rfind(is_separator) else {
        return "";
    };
    let head = &path[..i + 1];
    let trimmed = head.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        head
    } else {
        trimmed
    }
}

/// File name before its first extension separator.
pub fn noext(path: &str) -> &str {
    let name = basename(path);
    name.split('.').next().unwrap_or(name)
}

/// First extension component of the file name.
pub fn ext(path: &str) -> Result<&str, String> {
    basename(path)
        .split('.')
        .nth(1)
        .ok_or_else(|| format!("`{}` has no extension", path))
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Context {
    /// Copies the data; registered formatting functions reset to the
    /// built-in set.
    fn clone(&self) -> Self {
        Context {
            data: self.data.clone(),
            functions: builtin_functions(),
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .all(|(k, v)| other.data.get(k).is_some_and(|o| o == v))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}
