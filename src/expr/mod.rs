//! Expression language: AST, runtime values, parser and evaluator.
//!
//! # Architecture
//!
//! ```text
//! "fn a.b [1,2]"
//!     │
//!     ├── parser::parse()          text → Expr
//!     │
//!     ├── MetadataContext          chained name → Expr scopes
//!     │
//!     └── Reducer::reduce()        Expr + context → Value (async)
//!             │
//!             └── format_value()   Value → output text
//! ```
//!
//! Expressions are immutable once built. Only reduction may call out to
//! callables that perform I/O.

mod callable;
mod context;
mod format;
pub mod parser;
mod reducer;

pub use callable::{Callable, Lookup};
pub use context::MetadataContext;
pub use format::{FormatProvider, format_value};
pub use parser::{ListKind, parse, parse_keyword};
pub use reducer::Reducer;

use crate::entry::Entry;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use std::fmt;

// ============================================================================
// Runtime Values
// ============================================================================

/// A fully reduced runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<FixedOffset>),
    List(Vec<Value>),
    Entry(Entry),
    Callable(Callable),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Self::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic built-ins.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Short type name for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Date(_) => "date",
            Self::List(_) => "list",
            Self::Entry(_) => "entry",
            Self::Callable(_) => "function",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Entry> for Value {
    fn from(value: Entry) -> Self {
        Self::Entry(value)
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal runtime value.
    Value(Value),
    /// Dotted name, e.g. `item.entries`.
    Variable(String),
    /// `[a, b, c]`; a singleton array stays an array.
    Array(Vec<Expr>),
    /// `(fn arg1 arg2)` or bare `fn arg1 arg2`.
    Apply(Box<Expr>, Vec<Expr>),
}

impl Expr {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn apply(function: Expr, args: Vec<Expr>) -> Self {
        Self::Apply(Box::new(function), args)
    }

    /// Name of a plain, undotted variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Pretty-printer whose output parses back to an equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write_literal(f, value),
            Self::Variable(name) => f.write_str(name),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Apply(function, args) => {
                write!(f, "({function}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("''"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Float(x) => write!(f, "{x:?}"),
        Value::Str(s) if s.contains('\'') => write!(f, "\"{s}\""),
        Value::Str(s) => write!(f, "'{s}'"),
        Value::Date(date) => f.write_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        Value::List(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write_literal(f, item)?;
            }
            f.write_str("]")
        }
        Value::Entry(entry) => write!(f, "'{}'", entry.kind()),
        Value::Callable(callable) => f.write_str(callable.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_apply() {
        let expr = Expr::apply(
            Expr::var("add"),
            vec![Expr::value(1), Expr::Array(vec![Expr::value("a b")])],
        );
        assert_eq!(expr.to_string(), "(add 1 ['a b'])");
    }

    #[test]
    fn test_display_quotes() {
        assert_eq!(Expr::value("it's").to_string(), "\"it's\"");
        assert_eq!(Expr::Value(Value::Float(1.0)).to_string(), "1.0");
    }

    #[test]
    fn test_structural_equality() {
        let a = Expr::apply(Expr::var("foreach"), vec![Expr::var("tags")]);
        let b = Expr::apply(Expr::var("foreach"), vec![Expr::var("tags")]);
        assert_eq!(a, b);
        assert_ne!(a, Expr::var("foreach"));
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("2.5").as_f64(), Some(2.5));
        assert_eq!(Value::Null.as_f64(), None);
    }
}
