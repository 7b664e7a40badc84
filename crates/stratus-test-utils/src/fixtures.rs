//! Reusable step fixtures.
//!
//! - [`IdentityStep`] returns its input state unchanged, optionally
//!   declaring requirements.
//! - [`ShiftStep`] adds a constant to one array field.
//! - [`ForcedStep`] integrates a forcing tendency into a state field.
//! - [`FailingStep`] fails deterministically after N calls.
//!
//! Every fixture counts its invocations through a shared counter, so the
//! count stays observable after the step is boxed into a chain or driver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stratus_core::{Backend, StepError, Value};
use stratus_step::{Requirement, Step, StepContext, StepOutput};

/// Shared invocation counter handed out by the fixtures.
#[derive(Clone, Debug, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations so far.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to zero.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

// ── IdentityStep ────────────────────────────────────────────────

/// Returns the input state unchanged with empty diagnostics.
pub struct IdentityStep<B: Backend> {
    pub name: String,
    requirements: Vec<Requirement<B::Array>>,
    calls: CallCounter,
}

impl<B: Backend> IdentityStep<B> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            calls: CallCounter::new(),
        }
    }

    /// Declare requirements on this step.
    pub fn with_requirements(mut self, requirements: Vec<Requirement<B::Array>>) -> Self {
        self.requirements = requirements;
        self
    }

    /// How many times `step()` has run.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// A handle to the call counter that outlives moving the step.
    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<B: Backend> Step<B> for IdentityStep<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[Requirement<B::Array>] {
        &self.requirements
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        self.calls.bump();
        Ok(StepOutput::new(ctx.state().clone()))
    }
}

// ── ShiftStep ───────────────────────────────────────────────────

/// Adds `delta` to array field `field` (scaled by `dt` when `per_dt`).
pub struct ShiftStep {
    pub name: String,
    pub field: String,
    pub delta: f64,
    pub per_dt: bool,
    calls: CallCounter,
}

impl ShiftStep {
    pub fn new(name: impl Into<String>, field: impl Into<String>, delta: f64) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            delta,
            per_dt: false,
            calls: CallCounter::new(),
        }
    }

    /// Interpret `delta` as a rate and multiply by `dt`.
    pub fn per_dt(mut self) -> Self {
        self.per_dt = true;
        self
    }

    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<B: Backend> Step<B> for ShiftStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        self.calls.bump();
        let mut state = ctx.state().clone();
        let arr = match state.get(&self.field) {
            Some(Value::Array(a)) => a,
            Some(other) => {
                return Err(StepError::execution(
                    &self.name,
                    format!("field '{}' is {}, not an array", self.field, other.kind()),
                ))
            }
            None => {
                return Err(StepError::execution(
                    &self.name,
                    format!("field '{}' missing", self.field),
                ))
            }
        };
        let delta = if self.per_dt {
            self.delta * ctx.dt()
        } else {
            self.delta
        };
        let shifted = ctx.backend().add_scalar(arr, delta);
        state.insert(self.field.clone(), Value::Array(shifted));
        Ok(StepOutput::new(state))
    }
}

// ── ForcedStep ──────────────────────────────────────────────────

/// `state[field] += dt * forcing[tendency]`. Leaves the field unchanged
/// when the forcing entry is absent.
pub struct ForcedStep {
    pub name: String,
    pub field: String,
    pub tendency: String,
}

impl ForcedStep {
    pub fn new(field: impl Into<String>, tendency: impl Into<String>) -> Self {
        Self {
            name: "forced".into(),
            field: field.into(),
            tendency: tendency.into(),
        }
    }
}

impl<B: Backend> Step<B> for ForcedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let mut state = ctx.state().clone();
        if let (Some(Value::Array(x)), Some(Value::Array(rate))) = (
            ctx.state().get(&self.field),
            ctx.forcing().get(&self.tendency),
        ) {
            let b = ctx.backend();
            let next = b.add(x, &b.scale(rate, ctx.dt()));
            state.insert(self.field.clone(), Value::Array(next));
        }
        Ok(StepOutput::new(state))
    }
}

// ── FailingStep ─────────────────────────────────────────────────

/// Succeeds `succeed_count` times (as identity), then fails with
/// [`StepError::Execution`] on every further call.
pub struct FailingStep {
    pub name: String,
    pub succeed_count: usize,
    calls: CallCounter,
}

impl FailingStep {
    pub fn new(name: impl Into<String>, succeed_count: usize) -> Self {
        Self {
            name: name.into(),
            succeed_count,
            calls: CallCounter::new(),
        }
    }

    /// How many times `step()` has been called.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Reset the call counter.
    pub fn reset(&self) {
        self.calls.reset();
    }

    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<B: Backend> Step<B> for FailingStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let n = self.calls.bump();
        if n >= self.succeed_count {
            return Err(StepError::execution(
                &self.name,
                format!(
                    "deliberate failure after {} successful calls",
                    self.succeed_count
                ),
            ));
        }
        Ok(StepOutput::new(ctx.state().clone()))
    }
}
