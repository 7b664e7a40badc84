//! Declarative input requirements.
//!
//! A [`Requirement`] names a dotted path inside state, params, or forcing
//! and optionally constrains the value found there by kind and by
//! predicate. Steps declare requirements through
//! [`Step::requirements`](crate::Step::requirements); [`requires`] attaches
//! them to an existing step. [`collect_requirements`] walks the
//! [`Step::wrapped`](crate::Step::wrapped) chain so requirements declared
//! deep inside a middleware stack are still found.
//!
//! [`validate_requirements`] never mutates its inputs; it only reports.

use std::fmt;
use std::sync::Arc;

use stratus_core::{
    Backend, FieldPath, Forcing, Location, Params, Record, Severity, State, StepError, Value,
    ValueKind, Violation,
};

use crate::step::{Step, StepContext, StepOutput};

/// A check on a resolved value.
pub enum Predicate<A> {
    /// `false` is a violation.
    Plain(Arc<dyn Fn(&Value<A>) -> bool + Send + Sync>),
    /// `Ok(false)` and `Err` are violations; the error text becomes the
    /// violation message.
    Fallible(Arc<dyn Fn(&Value<A>) -> Result<bool, String> + Send + Sync>),
}

impl<A> Predicate<A> {
    /// Evaluate against `value`.
    pub fn eval(&self, value: &Value<A>) -> Result<bool, String> {
        match self {
            Self::Plain(f) => Ok(f(value)),
            Self::Fallible(f) => f(value),
        }
    }
}

impl<A> Clone for Predicate<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(f) => Self::Plain(Arc::clone(f)),
            Self::Fallible(f) => Self::Fallible(Arc::clone(f)),
        }
    }
}

/// A declarative precondition on one input path.
pub struct Requirement<A> {
    location: Location,
    path: FieldPath,
    required: bool,
    kind: Option<ValueKind>,
    predicate: Option<Predicate<A>>,
    message: Option<String>,
    severity: Severity,
}

impl<A> Requirement<A> {
    /// A required, error-severity requirement on `path` inside `location`.
    pub fn new(location: Location, path: &str) -> Self {
        Self {
            location,
            path: FieldPath::parse(path),
            required: true,
            kind: None,
            predicate: None,
            message: None,
            severity: Severity::Error,
        }
    }

    /// Requirement on a state path.
    pub fn state(path: &str) -> Self {
        Self::new(Location::State, path)
    }

    /// Requirement on a params path.
    pub fn params(path: &str) -> Self {
        Self::new(Location::Params, path)
    }

    /// Requirement on a forcing path.
    pub fn forcing(path: &str) -> Self {
        Self::new(Location::Forcing, path)
    }

    /// Require the resolved value to be of `kind`.
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Require `pred` to hold for the resolved value.
    pub fn predicate<F>(mut self, pred: F) -> Self
    where
        F: Fn(&Value<A>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Predicate::Plain(Arc::new(pred)));
        self
    }

    /// Like [`predicate`](Self::predicate), for checks that can fail
    /// outright (e.g. on a value they cannot interpret).
    pub fn try_predicate<F>(mut self, pred: F) -> Self
    where
        F: Fn(&Value<A>) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.predicate = Some(Predicate::Fallible(Arc::new(pred)));
        self
    }

    /// A missing path is acceptable; checks apply only when present.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Shorthand for `severity(Severity::Warn)`.
    pub fn warn(self) -> Self {
        self.severity(Severity::Warn)
    }

    /// Replace the generated violation message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Container inspected.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Dotted path inspected.
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Whether a missing path is a violation.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Declared severity.
    pub fn declared_severity(&self) -> Severity {
        self.severity
    }

    /// Evaluate against the container this requirement targets.
    ///
    /// Returns `None` when satisfied (or when an optional path is absent).
    pub fn check(&self, container: &Record<A>) -> Option<Violation> {
        let value = match self.path.resolve(container) {
            Ok(v) => v,
            Err(e) if self.required => return Some(self.violation(e.to_string())),
            Err(_) => return None,
        };

        if let Some(kind) = self.kind {
            if !kind.admits(value) {
                return Some(self.violation(format!(
                    "expected {kind}, got {}",
                    value.kind()
                )));
            }
        }

        match self.predicate.as_ref().map(|p| p.eval(value)) {
            None | Some(Ok(true)) => None,
            Some(Ok(false)) => Some(self.violation("predicate returned false".to_string())),
            Some(Err(e)) => Some(self.violation(format!("predicate failed: {e}"))),
        }
    }

    fn violation(&self, generated: String) -> Violation {
        Violation {
            location: self.location,
            path: self.path.as_str().to_string(),
            severity: self.severity,
            message: self.message.clone().unwrap_or(generated),
        }
    }
}

impl<A> Clone for Requirement<A> {
    fn clone(&self) -> Self {
        Self {
            location: self.location,
            path: self.path.clone(),
            required: self.required,
            kind: self.kind,
            predicate: self.predicate.clone(),
            message: self.message.clone(),
            severity: self.severity,
        }
    }
}

impl<A> fmt::Debug for Requirement<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("location", &self.location)
            .field("path", &self.path.as_str())
            .field("required", &self.required)
            .field("kind", &self.kind)
            .field("predicate", &self.predicate.is_some())
            .field("message", &self.message)
            .field("severity", &self.severity)
            .finish()
    }
}

// ── Validation ──────────────────────────────────────────────────

/// Outcome of [`validate_requirements`], split by severity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct Validation {
    /// Error-severity violations, in requirement order.
    pub errors: Vec<Violation>,
    /// Warning-severity violations, in requirement order.
    pub warnings: Vec<Violation>,
}

impl Validation {
    /// No violations of either severity.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// At least one error-severity violation.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Check every requirement against the matching container.
pub fn validate_requirements<A>(
    state: &State<A>,
    params: &Params<A>,
    forcing: &Forcing<A>,
    requirements: &[Requirement<A>],
) -> Validation {
    let mut out = Validation::default();
    for req in requirements {
        let container = match req.location {
            Location::State => state,
            Location::Params => params,
            Location::Forcing => forcing,
        };
        if let Some(v) = req.check(container) {
            match v.severity {
                Severity::Error => out.errors.push(v),
                Severity::Warn => out.warnings.push(v),
            }
        }
    }
    out
}

/// All requirements declared by `step` and every step it wraps,
/// outermost first.
pub fn collect_requirements<B: Backend>(step: &dyn Step<B>) -> Vec<Requirement<B::Array>> {
    let mut out = Vec::new();
    let mut current = Some(step);
    while let Some(s) = current {
        out.extend(s.requirements().iter().cloned());
        current = s.wrapped();
    }
    out
}

// ── Attachment ──────────────────────────────────────────────────

/// A step with extra declared requirements. Built with [`requires`].
///
/// Delegates execution unchanged; it exists so the requirements travel
/// with the step value.
pub struct Requires<B: Backend, S> {
    inner: S,
    requirements: Vec<Requirement<B::Array>>,
}

/// Attach `requirements` to `step`.
///
/// Attaching to an already-wrapped step adds to what it declares rather
/// than replacing it, since discovery walks the whole chain.
pub fn requires<B, S>(step: S, requirements: Vec<Requirement<B::Array>>) -> Requires<B, S>
where
    B: Backend,
    S: Step<B>,
{
    Requires {
        inner: step,
        requirements,
    }
}

impl<B, S> Step<B> for Requires<B, S>
where
    B: Backend,
    S: Step<B>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn requirements(&self) -> &[Requirement<B::Array>] {
        &self.requirements
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        self.inner.step(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_test_utils::{VecArray, VecBackend};

    type Req = Requirement<VecArray>;

    fn params_with_radius(radius: Value<VecArray>) -> Params<VecArray> {
        let mut spectral = Record::new();
        spectral.insert("radius".into(), radius);
        let mut params = Record::new();
        params.insert("spectral".into(), Value::Record(spectral));
        params
    }

    fn positive_radius() -> Req {
        Req::params("spectral.radius")
            .kind(ValueKind::Numeric)
            .predicate(|v| v.as_f64().is_some_and(|r| r > 0.0))
    }

    #[test]
    fn satisfied_requirement_is_clean() {
        let params = params_with_radius(Value::Float(6.371e6));
        let empty = Record::new();
        let v = validate_requirements(&empty, &params, &empty, &[positive_radius()]);
        assert!(v.is_clean());
    }

    #[test]
    fn predicate_false_is_error() {
        let params = params_with_radius(Value::Int(-1));
        let empty = Record::new();
        let v = validate_requirements(&empty, &params, &empty, &[positive_radius()]);
        assert_eq!(v.errors.len(), 1);
        assert_eq!(v.errors[0].path, "spectral.radius");
        assert_eq!(v.errors[0].message, "predicate returned false");
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn kind_mismatch_skips_predicate() {
        let params = params_with_radius(Value::Str("big".into()));
        let empty = Record::new();
        let req = Req::params("spectral.radius")
            .kind(ValueKind::Numeric)
            .predicate(|_| panic!("predicate must not run after a kind mismatch"));
        let v = validate_requirements(&empty, &params, &empty, &[req]);
        assert_eq!(v.errors.len(), 1);
        assert_eq!(v.errors[0].message, "expected numeric, got str");
    }

    #[test]
    fn missing_required_names_segment() {
        let params = params_with_radius(Value::Float(1.0));
        let empty = Record::new();
        let req = Req::params("grid.dx_min");
        let v = validate_requirements(&empty, &params, &empty, &[req]);
        assert_eq!(v.errors.len(), 1);
        assert!(v.errors[0].message.contains("'grid'"));
        assert!(v.errors[0].message.contains("grid.dx_min"));
    }

    #[test]
    fn missing_optional_is_skipped() {
        let empty = Record::new();
        let req = Req::forcing("SW").optional().kind(ValueKind::Array);
        let v = validate_requirements(&empty, &empty, &empty, &[req]);
        assert!(v.is_clean());
    }

    #[test]
    fn warn_severity_routes_to_warnings() {
        let empty = Record::new();
        let req = Req::state("q").warn().message("no humidity field");
        let v = validate_requirements(&empty, &empty, &empty, &[req]);
        assert!(!v.has_errors());
        assert_eq!(v.warnings.len(), 1);
        assert_eq!(v.warnings[0].message, "no humidity field");
        assert_eq!(v.warnings[0].severity, Severity::Warn);
    }

    #[test]
    fn failing_predicate_is_violation() {
        let params = params_with_radius(Value::Float(1.0));
        let empty = Record::new();
        let req = Req::params("spectral.radius").try_predicate(|_| Err("unit unknown".into()));
        let v = validate_requirements(&empty, &params, &empty, &[req]);
        assert_eq!(v.errors[0].message, "predicate failed: unit unknown");
    }

    #[test]
    fn requires_is_discoverable_through_wrappers() {
        let core = crate::step_fn("core", |ctx: &StepContext<'_, VecBackend>| {
            Ok(StepOutput::new(ctx.state().clone()))
        });
        let inner = requires(core, vec![Req::state("T")]);
        let outer = requires(inner, vec![Req::params("time.dt").optional()]);

        let found = collect_requirements::<VecBackend>(&outer);
        let paths: Vec<_> = found.iter().map(|r| r.path().as_str()).collect();
        assert_eq!(paths, vec!["time.dt", "T"]);
        assert_eq!(Step::<VecBackend>::name(&outer), "core");
    }
}
