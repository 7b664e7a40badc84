//! Destructuring helpers for records.
//!
//! Steps typically pull a handful of named fields out of state or params
//! at the top of their body. These helpers do that in one expression and
//! fail with an error that says what was expected and what was there.

use std::error::Error;
use std::fmt;

use crate::path::{FieldPath, PathError};
use crate::value::{Record, Value};

/// A required top-level key was absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyError {
    /// The first missing key.
    pub missing: String,
    /// All keys the caller asked for.
    pub expected: Vec<String>,
    /// Keys actually present in the record.
    pub available: Vec<String>,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing required key '{}'; expected {:?}, available {:?}",
            self.missing, self.expected, self.available
        )
    }
}

impl Error for KeyError {}

/// Borrow `N` top-level values, or `None` if any key is absent.
///
/// ```
/// use stratus_core::{take, Record, Value};
///
/// let mut state: Record<()> = Record::new();
/// state.insert("T".into(), Value::Float(300.0));
/// state.insert("q".into(), Value::Float(0.01));
/// let [t, q] = take(&state, ["T", "q"]).unwrap();
/// assert_eq!(t.as_f64(), Some(300.0));
/// assert_eq!(q.as_f64(), Some(0.01));
/// ```
pub fn take<'r, A, const N: usize>(
    record: &'r Record<A>,
    keys: [&str; N],
) -> Option<[&'r Value<A>; N]> {
    if keys.iter().any(|k| !record.contains_key(*k)) {
        return None;
    }
    Some(std::array::from_fn(|i| &record[keys[i]]))
}

/// Like [`take`], but reports the missing key alongside expected and
/// available keys.
pub fn require<'r, A, const N: usize>(
    record: &'r Record<A>,
    keys: [&str; N],
) -> Result<[&'r Value<A>; N], KeyError> {
    if let Some(missing) = keys.iter().find(|k| !record.contains_key(**k)) {
        return Err(KeyError {
            missing: missing.to_string(),
            expected: keys.iter().map(|k| k.to_string()).collect(),
            available: record.keys().cloned().collect(),
        });
    }
    Ok(std::array::from_fn(|i| &record[keys[i]]))
}

/// Resolve `N` dotted paths, failing on the first unresolvable one.
pub fn take_nested<'r, A, const N: usize>(
    record: &'r Record<A>,
    paths: [&str; N],
) -> Result<[&'r Value<A>; N], PathError> {
    let mut resolved: Vec<&'r Value<A>> = Vec::with_capacity(N);
    for path in paths {
        resolved.push(FieldPath::parse(path).resolve(record)?);
    }
    Ok(std::array::from_fn(|i| resolved[i]))
}

/// Partition a record into `(picked, rest)` by key. Keys not present are
/// ignored; `rest` keeps its original order.
pub fn split_keys<A: Clone>(record: &Record<A>, keys: &[&str]) -> (Record<A>, Record<A>) {
    let mut picked = Record::new();
    let mut rest = Record::new();
    for (k, v) in record {
        if keys.contains(&k.as_str()) {
            picked.insert(k.clone(), v.clone());
        } else {
            rest.insert(k.clone(), v.clone());
        }
    }
    (picked, rest)
}
