//! Floor selected fields after the inner step.

use serde_json::json;
use stratus_core::{Backend, StepError, Value};
use stratus_step::{Middleware, Step, StepContext, StepOutput};

use crate::grid;

/// Middleware name recorded in diagnostics.
pub const POSITIVITY: &str = "positivity";

/// Clamp fields to `>= lower`. Build with [`Positivity::builder`].
///
/// Non-finite values are never floored: they fail the step with
/// [`StepError::Numerical`] naming the field.
#[derive(Clone, Debug, PartialEq)]
pub struct Positivity {
    vars: Vec<String>,
    lower: f64,
}

/// Builder for [`Positivity`]. Every setting has a default.
#[derive(Clone, Debug)]
pub struct PositivityBuilder {
    vars: Vec<String>,
    lower: f64,
}

impl Positivity {
    /// Start configuring. Defaults: field `q`, floor 0.
    pub fn builder() -> PositivityBuilder {
        PositivityBuilder {
            vars: vec!["q".into()],
            lower: 0.0,
        }
    }
}

impl PositivityBuilder {
    /// Fields to floor when present.
    pub fn vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vars = vars.into_iter().map(Into::into).collect();
        self
    }

    /// The floor value.
    pub fn lower(mut self, lower: f64) -> Self {
        self.lower = lower;
        self
    }

    /// Build the middleware.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `lower` is not finite.
    pub fn build(self) -> Result<Positivity, String> {
        if !self.lower.is_finite() {
            return Err(format!("lower must be finite, got {}", self.lower));
        }
        Ok(Positivity {
            vars: self.vars,
            lower: self.lower,
        })
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for Positivity {
    type Wrapped = PositivityStep<S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        PositivityStep {
            inner,
            config: self.clone(),
        }
    }
}

/// The step produced by [`Positivity`].
#[derive(Debug)]
pub struct PositivityStep<S> {
    inner: S,
    config: Positivity,
}

impl<B: Backend, S: Step<B>> Step<B> for PositivityStep<S> {
    fn name(&self) -> &str {
        POSITIVITY
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let mut out = self.inner.step(ctx)?;
        let Positivity { vars, lower } = &self.config;
        let b = ctx.backend();
        let mut clamped = 0u64;
        for var in vars {
            let Some(x) = grid::array(&out.state, var) else {
                continue;
            };
            grid::ensure_finite(b, x, POSITIVITY, var)?;
            if b.min(x).is_some_and(|m| m < *lower) {
                tracing::warn!(field = %var, lower, "flooring field");
                let floored = grid::clamp_min(b, x, *lower);
                out.state.insert(var.clone(), Value::Array(floored));
                clamped += 1;
            }
        }
        out.diag.record_middleware(
            POSITIVITY,
            json!({ "vars": vars, "lower": lower, "clamped": clamped }),
        );
        Ok(out)
    }
}
