//! Dotted-path resolution over nested [`Record`]s.
//!
//! A [`FieldPath`] such as `"spectral.radius"` is split once at
//! construction; [`FieldPath::resolve`] then walks the segments with plain
//! key lookups and reports exactly which segment failed.

use smallvec::SmallVec;
use std::error::Error;
use std::fmt;

use crate::value::{Record, Value, ValueKind};

/// A pre-split dotted path into a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: SmallVec<[String; 4]>,
}

impl FieldPath {
    /// Split `path` on `.` into segments.
    pub fn parse(path: &str) -> Self {
        Self {
            raw: path.to_string(),
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// The original dotted form.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The individual key segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve this path inside `root`.
    ///
    /// Every segment must name a key of the current record; intermediate
    /// values must themselves be records.
    pub fn resolve<'r, A>(&self, root: &'r Record<A>) -> Result<&'r Value<A>, PathError> {
        let mut segments = self.segments.iter();
        // parse() always yields at least one segment.
        let first = segments.next().ok_or_else(|| self.missing(""))?;
        let mut current = root.get(first.as_str()).ok_or_else(|| self.missing(first))?;
        for segment in segments {
            let record = match current {
                Value::Record(r) => r,
                other => {
                    return Err(PathError::NotARecord {
                        segment: segment.clone(),
                        path: self.raw.clone(),
                        found: other.kind(),
                    })
                }
            };
            current = record
                .get(segment.as_str())
                .ok_or_else(|| self.missing(segment))?;
        }
        Ok(current)
    }

    fn missing(&self, segment: &str) -> PathError {
        PathError::MissingSegment {
            segment: segment.to_string(),
            path: self.raw.clone(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Why a [`FieldPath`] could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    /// A key was absent at some depth.
    MissingSegment {
        /// The key that was not found.
        segment: String,
        /// The full dotted path being resolved.
        path: String,
    },
    /// An intermediate value was not a record, so `segment` cannot be looked up.
    NotARecord {
        /// The key that could not be looked up.
        segment: String,
        /// The full dotted path being resolved.
        path: String,
        /// Kind of the value found in place of a record.
        found: ValueKind,
    },
}

impl PathError {
    /// The segment at which resolution stopped.
    pub fn segment(&self) -> &str {
        match self {
            Self::MissingSegment { segment, .. } | Self::NotARecord { segment, .. } => segment,
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSegment { segment, path } => {
                write!(f, "missing key '{segment}' while resolving '{path}'")
            }
            Self::NotARecord {
                segment,
                path,
                found,
            } => write!(
                f,
                "path '{path}' invalid: segment '{segment}' encountered non-record value of kind {found}"
            ),
        }
    }
}

impl Error for PathError {}
