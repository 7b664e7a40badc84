//! The tagged value model shared by state, params, and forcing.
//!
//! Containers are insertion-ordered [`Record`]s so that iteration,
//! diagnostics, and hook output are deterministic across runs.

use indexmap::IndexMap;
use std::fmt;

/// An insertion-ordered mapping from key to [`Value`].
pub type Record<A> = IndexMap<String, Value<A>>;

/// A single entry in a state, params, or forcing record.
///
/// `A` is the backend's opaque array handle. The core never inspects
/// array contents; it only moves handles around and hands them to the
/// backend.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<A> {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// Text (scheme names, labels).
    Str(String),
    /// Ordered list of values.
    List(Vec<Value<A>>),
    /// Nested record, e.g. `params.grid` or `state.misc`.
    Record(Record<A>),
    /// Opaque backend array handle.
    Array(A),
}

/// The structural kind of a [`Value`], used by requirement type checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Int`].
    Int,
    /// [`Value::Float`].
    Float,
    /// Either [`Value::Int`] or [`Value::Float`].
    Numeric,
    /// [`Value::Str`].
    Str,
    /// [`Value::List`].
    List,
    /// [`Value::Record`].
    Record,
    /// [`Value::Array`].
    Array,
}

impl ValueKind {
    /// Whether `value` is compatible with this kind.
    pub fn admits<A>(self, value: &Value<A>) -> bool {
        match self {
            Self::Numeric => matches!(value, Value::Int(_) | Value::Float(_)),
            kind => value.kind() == kind,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Numeric => "numeric",
            Self::Str => "str",
            Self::List => "list",
            Self::Record => "record",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

impl<A> Value<A> {
    /// The concrete kind of this value. Never returns [`ValueKind::Numeric`].
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::List(_) => ValueKind::List,
            Self::Record(_) => ValueKind::Record,
            Self::Array(_) => ValueKind::Array,
        }
    }

    /// Numeric scalar view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view. Floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Nested record view.
    pub fn as_record(&self) -> Option<&Record<A>> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Array handle view.
    pub fn as_array(&self) -> Option<&A> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl<A> From<bool> for Value<A> {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<A> From<i64> for Value<A> {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl<A> From<f64> for Value<A> {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<A> From<&str> for Value<A> {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl<A> From<String> for Value<A> {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<A> From<Record<A>> for Value<A> {
    fn from(v: Record<A>) -> Self {
        Self::Record(v)
    }
}

impl<A> From<Vec<Value<A>>> for Value<A> {
    fn from(v: Vec<Value<A>>) -> Self {
        Self::List(v)
    }
}
