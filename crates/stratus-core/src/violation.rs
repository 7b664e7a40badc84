//! Requirement violation records.
//!
//! These are plain data: they carry enough context to be rendered in an
//! error message or a diagnostics entry without holding on to the
//! requirement (and its predicate) that produced them.

use serde::Serialize;
use std::fmt;

/// Which input container a requirement inspects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// The evolving model state.
    State,
    /// The run's read-only parameters.
    Params,
    /// The per-step forcing record.
    Forcing,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::State => "state",
            Self::Params => "params",
            Self::Forcing => "forcing",
        })
    }
}

/// How a failed requirement is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Counts as an error; may abort the step.
    #[default]
    Error,
    /// Recorded only; never aborts.
    Warn,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
        })
    }
}

/// One failed requirement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Container the requirement inspected.
    #[serde(rename = "where")]
    pub location: Location,
    /// Dotted path of the requirement.
    pub path: String,
    /// Declared severity of the requirement.
    pub severity: Severity,
    /// Human-readable reason.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}.{}: {}",
            self.severity, self.location, self.path, self.message
        )
    }
}
