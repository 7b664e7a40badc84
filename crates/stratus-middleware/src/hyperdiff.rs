//! Hyperdiffusion applied after the inner step.
//!
//! Each listed field present as an array becomes `x - coeff * lap(x)`,
//! where `lap` is the periodic second difference in grid-index units.
//! `order` is recorded but does not change the operator.

use serde_json::json;
use stratus_core::{Backend, StepError, Value};
use stratus_step::{Middleware, Step, StepContext, StepOutput};

use crate::grid;

/// Middleware name recorded in diagnostics.
pub const HYPERDIFF: &str = "hyperdiff";

/// Hyperdiffusion middleware. Build with [`Hyperdiffusion::builder`].
#[derive(Clone, Debug, PartialEq)]
pub struct Hyperdiffusion {
    coeff: f64,
    order: u32,
    vars: Vec<String>,
}

/// Builder for [`Hyperdiffusion`]. Every setting has a default.
#[derive(Clone, Debug)]
pub struct HyperdiffusionBuilder {
    coeff: f64,
    order: u32,
    vars: Vec<String>,
}

impl Hyperdiffusion {
    /// Start configuring. Defaults: `coeff = 0`, `order = 4`, fields `T`, `u`, `v`.
    pub fn builder() -> HyperdiffusionBuilder {
        HyperdiffusionBuilder {
            coeff: 0.0,
            order: 4,
            vars: vec!["T".into(), "u".into(), "v".into()],
        }
    }
}

impl HyperdiffusionBuilder {
    /// Diffusion coefficient. Zero leaves state untouched.
    pub fn coeff(mut self, coeff: f64) -> Self {
        self.coeff = coeff;
        self
    }

    /// Nominal operator order, recorded in diagnostics.
    pub fn order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Fields to diffuse when present.
    pub fn vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vars = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Build the middleware.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `coeff` is not finite or `order` is odd or zero.
    pub fn build(self) -> Result<Hyperdiffusion, String> {
        if !self.coeff.is_finite() {
            return Err(format!("coeff must be finite, got {}", self.coeff));
        }
        if self.order == 0 || self.order % 2 != 0 {
            return Err(format!("order must be even and > 0, got {}", self.order));
        }
        Ok(Hyperdiffusion {
            coeff: self.coeff,
            order: self.order,
            vars: self.vars,
        })
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for Hyperdiffusion {
    type Wrapped = HyperdiffusionStep<S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        HyperdiffusionStep {
            inner,
            config: self.clone(),
        }
    }
}

/// The step produced by [`Hyperdiffusion`].
#[derive(Debug)]
pub struct HyperdiffusionStep<S> {
    inner: S,
    config: Hyperdiffusion,
}

impl<B: Backend, S: Step<B>> Step<B> for HyperdiffusionStep<S> {
    fn name(&self) -> &str {
        HYPERDIFF
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let mut out = self.inner.step(ctx)?;
        let Hyperdiffusion { coeff, order, vars } = &self.config;
        if *coeff != 0.0 {
            let b = ctx.backend();
            for var in vars {
                let Some(x) = grid::array(&out.state, var) else {
                    continue;
                };
                let lap = grid::laplacian(b, x, 1.0);
                let next = b.sub(x, &b.scale(&lap, *coeff));
                grid::ensure_finite(b, &next, HYPERDIFF, var)?;
                out.state.insert(var.clone(), Value::Array(next));
            }
        }
        out.diag.record_middleware(
            HYPERDIFF,
            json!({ "coeff": coeff, "order": order, "vars": vars }),
        );
        Ok(out)
    }
}
