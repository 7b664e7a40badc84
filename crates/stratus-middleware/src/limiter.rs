//! Extrema limiting: no new global extrema.
//!
//! Records the global range of each listed field before the inner step
//! and clamps the stepped field back into that range. Fields absent from
//! either the input or output state, or not arrays, are left alone.

use serde_json::json;
use stratus_core::{Backend, StepError, Value};
use stratus_step::{Middleware, Step, StepContext, StepOutput};

use crate::grid;

/// Middleware name recorded in diagnostics.
pub const EXTREMA_LIMITER: &str = "extrema_limiter";

/// Clamp fields to their pre-step global range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtremaLimiter {
    vars: Vec<String>,
}

impl ExtremaLimiter {
    /// Limit `vars`.
    pub fn new<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ExtremaLimiter {
    /// Limits `q` and `T`.
    fn default() -> Self {
        Self::new(["q", "T"])
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for ExtremaLimiter {
    type Wrapped = ExtremaLimiterStep<S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        ExtremaLimiterStep {
            inner,
            vars: self.vars.clone(),
        }
    }
}

/// The step produced by [`ExtremaLimiter`].
#[derive(Debug)]
pub struct ExtremaLimiterStep<S> {
    inner: S,
    vars: Vec<String>,
}

impl<B: Backend, S: Step<B>> Step<B> for ExtremaLimiterStep<S> {
    fn name(&self) -> &str {
        EXTREMA_LIMITER
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let b = ctx.backend();
        let bounds: Vec<(&String, Option<(f64, f64)>)> = self
            .vars
            .iter()
            .map(|v| {
                let range = grid::array(ctx.state(), v)
                    .and_then(|a| Some((b.min(a)?, b.max(a)?)));
                (v, range)
            })
            .collect();

        let mut out = self.inner.step(ctx)?;
        let mut clamped = Vec::new();
        for (var, range) in bounds {
            let (Some((lo, hi)), Some(x)) = (range, grid::array(&out.state, var)) else {
                continue;
            };
            let exceeds = b.min(x).is_some_and(|m| m < lo) || b.max(x).is_some_and(|m| m > hi);
            if exceeds {
                tracing::warn!(field = %var, lo, hi, "clamping field to pre-step range");
                let limited = grid::clamp(b, x, lo, hi);
                out.state.insert(var.clone(), Value::Array(limited));
                clamped.push(var.clone());
            }
        }
        out.diag.record_middleware(
            EXTREMA_LIMITER,
            json!({ "vars": self.vars, "clamped": clamped }),
        );
        Ok(out)
    }
}
