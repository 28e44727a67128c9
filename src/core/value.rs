//! Values stored in a [`Context`](super::context::Context).
//!
//! A value is either plain data (scalars, lists, nested contexts) or a lazy
//! zero-argument function that produces data when read. Lazy values are
//! never handed out as-is: every read site goes through
//! [`Value::resolve`] first.

use std::fmt;
use std::sync::Arc;

use super::context::Context;

/// A zero-argument function producing a value on demand.
pub type LazyFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// A value held by a context.
#[derive(Clone)]
pub enum Value {
    /// String scalar. Passed through the formatter when read.
    Str(String),
    /// Integer scalar.
    Int(i64),
    /// Float scalar.
    Float(f64),
    /// Boolean scalar.
    Bool(bool),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested context (from a table in the spec).
    Table(Context),
    /// Lazily computed value.
    Lazy(LazyFn),
}

impl Value {
    /// Wrap a closure as a lazy value.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Value::Lazy(Arc::new(f))
    }

    /// Resolve a lazy value to data. Data values are returned unchanged.
    ///
    /// A lazy function returning another lazy function is resolved again.
    pub fn resolve(&self) -> Value {
        match self {
            Value::Lazy(f) => f().resolve(),
            other => other.clone(),
        }
    }

    /// Whether this is a scalar (string, int, float or bool).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Str(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_)
        )
    }

    /// Borrow the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view of the value, accepting `"true"`/`"false"` strings too.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Integer view of the value, parsing strings when needed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Render a scalar or a list of scalars as text.
    ///
    /// Lists are joined with single spaces. Tables have no text form.
    pub fn to_text(&self) -> Option<String> {
        match self.resolve() {
            Value::Str(s) => Some(s),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(item.to_text()?);
                }
                Some(parts.join(" "))
            }
            Value::Table(_) | Value::Lazy(_) => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Table(_) => "table",
            Value::Lazy(_) => "lazy function",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Table(ctx) => write!(f, "{:?}", ctx),
            Value::Lazy(_) => write!(f, "<lazy>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.resolve(), other.resolve()) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        Value::Table(ctx)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::Str(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(x) => Value::Float(x),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::Str(d.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Table(Context::from_toml(table)),
        }
    }
}
