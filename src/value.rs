//! Dynamic values for spy arguments and stub returns.
//!
//! The code under test in a mocking scenario exchanges loosely-typed data:
//! call arguments, stub return values, expectation patterns. `Value` is the
//! common currency for all of them, with structural equality, truthiness and
//! a diff rendering used in assertion failure messages.

use std::collections::BTreeMap;
use std::fmt;

/// A dynamically-typed value: spy call arguments, stub returns and
/// expectation patterns are all `Value`s.
///
/// Build values with `From` conversions or the [`vals!`](crate::vals) macro:
///
/// ```
/// use monomi::{vals, Value};
///
/// let v: Value = 42.into();
/// assert_eq!(v, Value::Int(42));
///
/// let args = vals![1, "two", 3.0, true];
/// assert_eq!(args.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// The discriminant of a [`Value`], used by type-check matchers and
/// [`Assertion::to_be_a`](crate::Assertion::to_be_a).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// Returns true unless the value is `Nil` or `Bool(false)`.
    ///
    /// These are the truthiness rules the assertion verbs inherit.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Returns true if the value is `Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns true for `Int` and `Float` values.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Returns the integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the numeric payload as `f64` for both `Int` and `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Structural deep equality. `Int` and `Float` compare numerically, so
    /// `Value::Int(1)` equals `Value::Float(1.0)`.
    pub fn deep_eq(&self, other: &Value) -> bool {
        self.deep_eq_impl(other, None)
    }

    /// Structural deep equality with a numeric tolerance applied at every
    /// numeric leaf.
    pub fn deep_eq_approx(&self, other: &Value, epsilon: f64) -> bool {
        self.deep_eq_impl(other, Some(epsilon))
    }

    fn deep_eq_impl(&self, other: &Value, epsilon: Option<f64>) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => {
                let (a, b) = (a.as_float().unwrap(), b.as_float().unwrap());
                match epsilon {
                    Some(eps) => (a - b).abs() <= eps,
                    None => a == b,
                }
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.deep_eq_impl(y, epsilon))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.get(k).is_some_and(|w| v.deep_eq_impl(w, epsilon))
                    })
            }
            _ => false,
        }
    }

    /// Structural containment:
    ///
    /// - a `List` contains any deep-equal element,
    /// - a `Map` contains any deep-equal entry value,
    /// - a `Str` contains any substring.
    ///
    /// All other combinations return false.
    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Value::List(items) => items.iter().any(|v| v.deep_eq(needle)),
            Value::Map(entries) => entries.values().any(|v| v.deep_eq(needle)),
            Value::Str(s) => needle.as_str().is_some_and(|sub| s.contains(sub)),
            _ => false,
        }
    }

    /// Returns true if this is a `Map` holding the given key.
    pub fn has_key(&self, key: &str) -> bool {
        match self {
            Value::Map(entries) => entries.contains_key(key),
            _ => false,
        }
    }

    /// Renders a line-per-difference report between `self` (expected) and
    /// `actual`, walking composite values by path. Empty when equal.
    pub fn diff(&self, actual: &Value) -> String {
        let mut lines = Vec::new();
        diff_at("$", self, actual, &mut lines);
        lines.join("\n")
    }
}

fn diff_at(path: &str, expected: &Value, actual: &Value, out: &mut Vec<String>) {
    if expected.deep_eq(actual) {
        return;
    }
    match (expected, actual) {
        (Value::Map(want), Value::Map(got)) => {
            for (key, v) in want {
                match got.get(key) {
                    Some(w) => diff_at(&format!("{path}.{key}"), v, w, out),
                    None => out.push(format!("  {path}.{key}: missing (expected {v})")),
                }
            }
            for (key, w) in got {
                if !want.contains_key(key) {
                    out.push(format!("  {path}.{key}: unexpected {w}"));
                }
            }
        }
        (Value::List(want), Value::List(got)) => {
            if want.len() != got.len() {
                out.push(format!(
                    "  {path}: length {} expected, got {}",
                    want.len(),
                    got.len()
                ));
            }
            for (i, (v, w)) in want.iter().zip(got).enumerate() {
                diff_at(&format!("{path}[{i}]"), v, w, out);
            }
        }
        _ => out.push(format!("  {path}: expected {expected}, got {actual}")),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Nil,
        }
    }
}

/// Builds a `Vec<Value>` argument list from literals.
///
/// ```
/// use monomi::vals;
///
/// let args = vals![1, "reload", true];
/// let empty = vals![];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! vals {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($v)),+]
    };
}
