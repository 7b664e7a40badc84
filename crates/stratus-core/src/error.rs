//! Error types raised by steps and the requirements subsystem.
//!
//! Hook, forcing, and run-loop errors live with the engine; this module
//! holds the errors that can surface from inside a (possibly wrapped)
//! step invocation.

use std::error::Error;
use std::fmt;

use crate::access::KeyError;
use crate::path::PathError;
use crate::violation::{Severity, Violation};

// ── RequirementError ────────────────────────────────────────────

/// One or more error-severity requirements were not met.
///
/// Carries every violation found on the failing invocation, not just the
/// first, so a user can fix all of them in one pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequirementError {
    /// The violations, in declaration order.
    pub violations: Vec<Violation>,
}

impl RequirementError {
    /// Wrap a set of violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Number of error-severity violations.
    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }
}

impl fmt::Display for RequirementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requirement violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "; {v}")?;
        }
        Ok(())
    }
}

impl Error for RequirementError {}

// ── StepError ───────────────────────────────────────────────────

/// Failure of a step invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// A requirements guard found error-severity violations and was
    /// configured to raise.
    Requirements(RequirementError),
    /// An unrecoverable numeric condition, e.g. non-finite values in a
    /// field a middleware was asked to keep bounded.
    Numerical {
        /// The step or middleware that detected the condition.
        stage: String,
        /// The offending field, if one can be named.
        field: Option<String>,
        /// Human-readable description.
        reason: String,
    },
    /// Any other failure inside a step body.
    Execution {
        /// The step that failed.
        stage: String,
        /// Human-readable description.
        reason: String,
    },
}

impl StepError {
    /// Shorthand for [`StepError::Execution`].
    pub fn execution(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`StepError::Numerical`].
    pub fn numerical(
        stage: impl Into<String>,
        field: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Numerical {
            stage: stage.into(),
            field: field.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requirements(e) => write!(f, "requirements not met: {e}"),
            Self::Numerical {
                stage,
                field: Some(field),
                reason,
            } => write!(f, "numerical failure in '{stage}' on field '{field}': {reason}"),
            Self::Numerical {
                stage,
                field: None,
                reason,
            } => write!(f, "numerical failure in '{stage}': {reason}"),
            Self::Execution { stage, reason } => write!(f, "step '{stage}' failed: {reason}"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Requirements(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RequirementError> for StepError {
    fn from(e: RequirementError) -> Self {
        Self::Requirements(e)
    }
}

impl From<PathError> for StepError {
    fn from(e: PathError) -> Self {
        Self::Execution {
            stage: "path".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<KeyError> for StepError {
    fn from(e: KeyError) -> Self {
        Self::Execution {
            stage: "access".to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Location;

    fn violation(path: &str, severity: Severity) -> Violation {
        Violation {
            location: Location::Params,
            path: path.into(),
            severity,
            message: "predicate returned false".into(),
        }
    }

    #[test]
    fn requirement_error_lists_every_violation() {
        let e = RequirementError::new(vec![
            violation("spectral.radius", Severity::Error),
            violation("grid.dx_min", Severity::Error),
        ]);
        let msg = e.to_string();
        assert!(msg.starts_with("2 requirement violation(s)"));
        assert!(msg.contains("spectral.radius"));
        assert!(msg.contains("grid.dx_min"));
        assert_eq!(e.error_count(), 2);
    }

    #[test]
    fn step_error_chains_requirement_source() {
        let e: StepError =
            RequirementError::new(vec![violation("spectral.radius", Severity::Error)]).into();
        assert!(e.source().is_some());
        assert!(e.to_string().contains("requirements not met"));
    }

    #[test]
    fn numerical_display_names_field() {
        let e = StepError::numerical("positivity", Some("q"), "non-finite values");
        assert_eq!(
            e.to_string(),
            "numerical failure in 'positivity' on field 'q': non-finite values"
        );
        assert!(e.source().is_none());
    }

    #[test]
    fn path_error_converts_to_execution() {
        let e: StepError = PathError::MissingSegment {
            segment: "dt".into(),
            path: "time.dt".into(),
        }
        .into();
        match e {
            StepError::Execution { reason, .. } => assert!(reason.contains("time.dt")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
