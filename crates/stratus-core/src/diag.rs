//! Per-invocation diagnostics.
//!
//! A [`Diag`] is produced by every step invocation and travels outward
//! through the middleware chain, then to the hooks and the run report. It
//! is never read back into state.
//!
//! The serialized form has stable top-level keys: [`MIDDLEWARE_KEY`],
//! [`REQUIREMENTS_KEY`], and [`TIMINGS_KEY`], with any free-form entries a
//! step author adds flattened alongside them.

use std::error::Error;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::violation::Violation;

/// Key of the ordered list of middleware metadata records.
pub const MIDDLEWARE_KEY: &str = "stratus_mw";

/// Key of the ordered list of requirements-guard reports.
pub const REQUIREMENTS_KEY: &str = "stratus_requirements";

/// Key of the timing section attached by the driver.
pub const TIMINGS_KEY: &str = "timings";

/// A free-form entry tried to use one of the fixed top-level keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedKeyError {
    /// The rejected key.
    pub key: String,
}

impl fmt::Display for ReservedKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "diagnostics key '{}' is reserved", self.key)
    }
}

impl Error for ReservedKeyError {}

/// One middleware's contribution to a step's diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MiddlewareRecord {
    /// Name of the middleware that produced this record.
    pub name: String,
    /// Middleware-specific metadata, flattened next to `name`.
    #[serde(flatten)]
    pub meta: Map<String, Json>,
}

impl MiddlewareRecord {
    /// Look up a metadata field.
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.meta.get(key)
    }
}

/// Violations recorded by a requirements guard on one checked invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequirementReport {
    /// 1-based index of the checked invocation on the guard instance.
    pub call: u64,
    /// The guard's configured check budget.
    pub max_checks: u64,
    /// Number of requirements evaluated.
    pub checked: usize,
    /// Error-severity violations that were downgraded instead of raised.
    pub errors: Vec<Violation>,
    /// Warning-severity violations.
    pub warnings: Vec<Violation>,
}

impl RequirementReport {
    /// Every recorded violation, errors first.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Timing section of a [`Diag`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Timings {
    /// Wall-clock duration of the step invocation, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_sec: Option<f64>,
}

/// Diagnostics for one step invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diag {
    /// Middleware records in the order they were appended.
    #[serde(rename = "stratus_mw", skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<MiddlewareRecord>,
    /// Requirements-guard reports in the order they were appended.
    #[serde(rename = "stratus_requirements", skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<RequirementReport>,
    /// Timing attached by the driver.
    pub timings: Timings,
    /// Free-form entries owned by step authors. Never holds a fixed key.
    #[serde(flatten)]
    extra: Map<String, Json>,
}

impl Diag {
    /// An empty diagnostics record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware metadata record.
    ///
    /// `meta` is normally an object built with `serde_json::json!`; its
    /// fields are stored next to `name`. Any other JSON value is stored
    /// under a `value` field.
    pub fn record_middleware(&mut self, name: impl Into<String>, meta: Json) {
        let meta = match meta {
            Json::Object(map) => map,
            Json::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.middleware.push(MiddlewareRecord {
            name: name.into(),
            meta,
        });
    }

    /// Names of the middleware records, in order.
    pub fn middleware_names(&self) -> impl Iterator<Item = &str> {
        self.middleware.iter().map(|r| r.name.as_str())
    }

    /// The most recent record appended by middleware `name`, if any.
    pub fn middleware_record(&self, name: &str) -> Option<&MiddlewareRecord> {
        self.middleware.iter().rev().find(|r| r.name == name)
    }

    /// Append a requirements-guard report.
    pub fn record_requirements(&mut self, report: RequirementReport) {
        self.requirements.push(report);
    }

    /// Set a free-form entry, returning the value it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ReservedKeyError`] for [`MIDDLEWARE_KEY`],
    /// [`REQUIREMENTS_KEY`], or [`TIMINGS_KEY`]; the entry would collide
    /// with a fixed key once serialized.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Json,
    ) -> Result<Option<Json>, ReservedKeyError> {
        let key = key.into();
        if matches!(key.as_str(), MIDDLEWARE_KEY | REQUIREMENTS_KEY | TIMINGS_KEY) {
            return Err(ReservedKeyError { key });
        }
        Ok(self.extra.insert(key, value))
    }

    /// Read a free-form entry.
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.extra.get(key)
    }

    /// All free-form entries, in insertion order.
    pub fn extra(&self) -> &Map<String, Json> {
        &self.extra
    }

    /// Fold a later invocation's diagnostics into this one.
    ///
    /// Middleware records and requirements reports are appended in order.
    /// Free-form entries from `later` replace same-named entries here.
    /// Step timings add up when either side carries one.
    pub fn absorb(&mut self, later: Diag) {
        self.middleware.extend(later.middleware);
        self.requirements.extend(later.requirements);
        self.timings.step_sec = match (self.timings.step_sec, later.timings.step_sec) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.extra.extend(later.extra);
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> Json {
        // Every field is a plain map, list, or number; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}
