//! Bounded requirements checking around a step.
//!
//! [`RequirementGuard`] validates the requirements discoverable from its
//! inner step (plus any extras) on the first `max_checks` invocations,
//! then stops checking for good. Misconfiguration is caught in the first
//! few steps without paying for validation on every step of a long run.

use std::sync::atomic::{AtomicU64, Ordering};

use stratus_core::{Backend, RequirementError, RequirementReport, StepError};

use crate::middleware::Middleware;
use crate::requirements::{collect_requirements, validate_requirements, Requirement};
use crate::step::{Step, StepContext, StepOutput};

/// Guard behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardConfig {
    /// Number of invocations that are validated. Zero disables checking.
    pub max_checks: u64,
    /// Fail the step on error-severity violations. When `false`, errors
    /// are recorded in diagnostics and the step runs.
    pub raise_on_error: bool,
    /// Record warning-severity violations in diagnostics.
    pub record_warnings: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_checks: 3,
            raise_on_error: true,
            record_warnings: true,
        }
    }
}

/// A step that validates requirements before delegating to its inner step.
///
/// The invocation counter is owned by this instance. Two guards around
/// the same shared inner step count independently.
pub struct RequirementGuard<B: Backend, S> {
    inner: S,
    extra: Vec<Requirement<B::Array>>,
    config: GuardConfig,
    calls: AtomicU64,
}

impl<B: Backend, S: Step<B>> RequirementGuard<B, S> {
    /// Guard `inner` with the default configuration.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, GuardConfig::default())
    }

    /// Guard `inner` with `config`.
    pub fn with_config(inner: S, config: GuardConfig) -> Self {
        Self {
            inner,
            extra: Vec::new(),
            config,
            calls: AtomicU64::new(0),
        }
    }

    /// Also check `extra`, in addition to what the inner chain declares.
    pub fn with_extra(mut self, extra: Vec<Requirement<B::Array>>) -> Self {
        self.extra = extra;
        self
    }

    /// Checked invocations so far, saturating at `max_checks`.
    pub fn checks_performed(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Whether validation has been retired.
    pub fn exhausted(&self) -> bool {
        self.checks_performed() >= self.config.max_checks
    }

    /// The active configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn record_call(&self) -> u64 {
        let max = self.config.max_checks;
        let prev = self
            .calls
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < max).then_some(c + 1)
            })
            .unwrap_or(max);
        let call = (prev + 1).min(max);
        if call == max {
            tracing::debug!(
                step = self.inner.name(),
                max_checks = max,
                "requirements guard exhausted, validation disabled"
            );
        }
        call
    }
}

impl<B: Backend, S: Step<B>> Step<B> for RequirementGuard<B, S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn requirements(&self) -> &[Requirement<B::Array>] {
        &self.extra
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        if self.exhausted() {
            return self.inner.step(ctx);
        }

        let mut requirements = collect_requirements(&self.inner);
        requirements.extend(self.extra.iter().cloned());
        let checked = requirements.len();
        let validation =
            validate_requirements(ctx.state(), ctx.params(), ctx.forcing(), &requirements);
        let call = self.record_call();

        if validation.has_errors() && self.config.raise_on_error {
            tracing::error!(
                step = self.inner.name(),
                call,
                errors = validation.errors.len(),
                "requirements not met"
            );
            return Err(StepError::Requirements(RequirementError::new(
                validation.errors,
            )));
        }

        let mut out = self.inner.step(ctx)?;

        let errors = if self.config.raise_on_error {
            Vec::new()
        } else {
            validation.errors
        };
        let warnings = if self.config.record_warnings {
            validation.warnings
        } else {
            Vec::new()
        };
        if !errors.is_empty() || !warnings.is_empty() {
            for v in errors.iter().chain(warnings.iter()) {
                tracing::warn!(step = self.inner.name(), call, violation = %v, "requirement violated");
            }
            out.diag.record_requirements(RequirementReport {
                call,
                max_checks: self.config.max_checks,
                checked,
                errors,
                warnings,
            });
        }
        Ok(out)
    }
}

/// Middleware form of [`RequirementGuard`].
#[derive(Clone, Debug)]
pub struct GuardLayer<A> {
    config: GuardConfig,
    extra: Vec<Requirement<A>>,
}

impl<A> GuardLayer<A> {
    /// A layer producing guards with `config`.
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            extra: Vec::new(),
        }
    }

    /// Extra requirements for every guard this layer produces.
    pub fn with_extra(mut self, extra: Vec<Requirement<A>>) -> Self {
        self.extra = extra;
        self
    }
}

impl<A> Default for GuardLayer<A> {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for GuardLayer<B::Array> {
    type Wrapped = RequirementGuard<B, S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        RequirementGuard::with_config(inner, self.config).with_extra(self.extra.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step_fn;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use stratus_core::{Params, Record, State, Value, ValueKind};
    use stratus_test_utils::{VecArray, VecBackend};

    fn radius_params(r: f64) -> Params<VecArray> {
        let mut spectral = Record::new();
        spectral.insert("radius".into(), Value::Float(r));
        let mut p = Record::new();
        p.insert("spectral".into(), Value::Record(spectral));
        p
    }

    fn positive_radius() -> Requirement<VecArray> {
        Requirement::params("spectral.radius")
            .kind(ValueKind::Numeric)
            .predicate(|v| v.as_f64().is_some_and(|r| r > 0.0))
    }

    fn counting_core(
        hits: Arc<AtomicUsize>,
    ) -> impl Step<VecBackend> {
        step_fn("core", move |ctx: &StepContext<'_, VecBackend>| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(StepOutput::new(ctx.state().clone()))
        })
    }

    #[test]
    fn raising_guard_blocks_inner_step() {
        let hits = Arc::new(AtomicUsize::new(0));
        let guard = RequirementGuard::new(counting_core(Arc::clone(&hits)))
            .with_extra(vec![positive_radius()]);
        let state: State<VecArray> = Record::new();
        let params = radius_params(-1.0);
        let forcing = Record::new();
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        let err = guard.step(&ctx).unwrap_err();
        match err {
            StepError::Requirements(e) => {
                assert_eq!(e.violations.len(), 1);
                assert_eq!(e.violations[0].path, "spectral.radius");
            }
            other => panic!("expected requirements error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(guard.checks_performed(), 1);
    }

    #[test]
    fn recording_guard_runs_step_and_reports() {
        let hits = Arc::new(AtomicUsize::new(0));
        let config = GuardConfig {
            raise_on_error: false,
            ..GuardConfig::default()
        };
        let guard = RequirementGuard::with_config(counting_core(Arc::clone(&hits)), config)
            .with_extra(vec![positive_radius()]);
        let state: State<VecArray> = Record::new();
        let params = radius_params(-1.0);
        let forcing = Record::new();
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        let out = guard.step(&ctx).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(out.diag.requirements.len(), 1);
        let report = &out.diag.requirements[0];
        assert_eq!(report.call, 1);
        assert_eq!(report.checked, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "spectral.radius");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn counter_saturates_and_skips_validation() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&evaluations);
        let req = Requirement::params("spectral.radius").predicate(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });
        let guard = RequirementGuard::with_config(
            counting_core(Arc::new(AtomicUsize::new(0))),
            GuardConfig {
                max_checks: 2,
                ..GuardConfig::default()
            },
        )
        .with_extra(vec![req]);
        let state: State<VecArray> = Record::new();
        let params = radius_params(1.0);
        let forcing = Record::new();
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        for _ in 0..5 {
            guard.step(&ctx).unwrap();
        }
        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
        assert_eq!(guard.checks_performed(), 2);
        assert!(guard.exhausted());
    }

    #[test]
    fn warnings_suppressed_when_not_recording() {
        let config = GuardConfig {
            record_warnings: false,
            ..GuardConfig::default()
        };
        let guard = RequirementGuard::with_config(
            counting_core(Arc::new(AtomicUsize::new(0))),
            config,
        )
        .with_extra(vec![Requirement::state("q").warn()]);
        let state: State<VecArray> = Record::new();
        let params = Record::new();
        let forcing = Record::new();
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        let out = guard.step(&ctx).unwrap();
        assert!(out.diag.requirements.is_empty());
    }

    #[test]
    fn zero_budget_never_checks() {
        let guard = RequirementGuard::with_config(
            counting_core(Arc::new(AtomicUsize::new(0))),
            GuardConfig {
                max_checks: 0,
                ..GuardConfig::default()
            },
        )
        .with_extra(vec![positive_radius()]);
        let state: State<VecArray> = Record::new();
        let params = radius_params(-1.0);
        let forcing = Record::new();
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        assert!(guard.step(&ctx).is_ok());
        assert_eq!(guard.checks_performed(), 0);
    }
}
