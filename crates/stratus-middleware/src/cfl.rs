//! CFL-based substepping.
//!
//! Computes the Courant number `cfl = vmax * dt / dx` before each step.
//! When it exceeds `cfl_max`, the inner step is run
//! `n = ceil(cfl / cfl_max)` times with `dt / n`, feeding each substep's
//! state into the next. Forcing and params are shared by every substep.
//!
//! `dx` is `params.grid.dx_min` when present and numeric, otherwise 1.0.
//! A zero `dx`, `vmax` or `dt` always takes the single-step path. A
//! negative or non-finite `dx`, or a Courant number that would need more
//! than `max_substeps` substeps, fails the step.
//!
//! The returned diagnostics carry every substep's records in order, so
//! inner middleware and guard reports are never lost to substepping.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::json;
use stratus_core::{Backend, Diag, StepError};
use stratus_step::{Middleware, Step, StepContext, StepOutput};

use crate::grid;

/// Middleware name recorded in diagnostics.
pub const CFL_GUARD: &str = "cfl_guard";

/// Substep limit used when the builder sets none.
pub const DEFAULT_MAX_SUBSTEPS: u64 = 10_000;

type WaveSpeedFn<B> = dyn Fn(&StepContext<'_, B>) -> f64 + Send + Sync;

enum WaveSpeed<B: Backend> {
    /// Largest absolute value over these state fields.
    Fields(Vec<String>),
    Custom(Arc<WaveSpeedFn<B>>),
}

impl<B: Backend> Clone for WaveSpeed<B> {
    fn clone(&self) -> Self {
        match self {
            Self::Fields(f) => Self::Fields(f.clone()),
            Self::Custom(f) => Self::Custom(Arc::clone(f)),
        }
    }
}

impl<B: Backend> WaveSpeed<B> {
    fn eval(&self, ctx: &StepContext<'_, B>) -> f64 {
        match self {
            Self::Custom(f) => f(ctx),
            Self::Fields(fields) => {
                let b = ctx.backend();
                fields
                    .iter()
                    .filter_map(|name| grid::array(ctx.state(), name))
                    .filter_map(|a| Some(b.max(a)?.abs().max(b.min(a)?.abs())))
                    .fold(0.0, f64::max)
            }
        }
    }
}

/// Stability control by substepping. Build with [`CflGuard::builder`].
pub struct CflGuard<B: Backend> {
    cfl_max: f64,
    max_substeps: u64,
    wave_speed: WaveSpeed<B>,
}

impl<B: Backend> Clone for CflGuard<B> {
    fn clone(&self) -> Self {
        Self {
            cfl_max: self.cfl_max,
            max_substeps: self.max_substeps,
            wave_speed: self.wave_speed.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for CflGuard<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CflGuard")
            .field("cfl_max", &self.cfl_max)
            .field("max_substeps", &self.max_substeps)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CflGuard`].
///
/// Required: a wave-speed source, either [`speed_fields`] or
/// [`wave_speed`].
///
/// [`speed_fields`]: CflGuardBuilder::speed_fields
/// [`wave_speed`]: CflGuardBuilder::wave_speed
pub struct CflGuardBuilder<B: Backend> {
    cfl_max: f64,
    max_substeps: u64,
    wave_speed: Option<WaveSpeed<B>>,
}

impl<B: Backend> CflGuard<B> {
    /// Start configuring a CFL guard.
    pub fn builder() -> CflGuardBuilder<B> {
        CflGuardBuilder {
            cfl_max: 0.8,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            wave_speed: None,
        }
    }

    /// The Courant number limit.
    pub fn cfl_max(&self) -> f64 {
        self.cfl_max
    }

    /// The most substeps one step may take.
    pub fn max_substeps(&self) -> u64 {
        self.max_substeps
    }
}

impl<B: Backend> CflGuardBuilder<B> {
    /// Courant number above which to substep (default: 0.8). Must be > 0.
    pub fn cfl_max(mut self, cfl_max: f64) -> Self {
        self.cfl_max = cfl_max;
        self
    }

    /// Fail instead of running more than `n` substeps
    /// (default: [`DEFAULT_MAX_SUBSTEPS`]).
    pub fn max_substeps(mut self, n: u64) -> Self {
        self.max_substeps = n;
        self
    }

    /// Take `vmax` as the largest absolute value over these state fields.
    /// Absent or non-array fields are ignored.
    pub fn speed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wave_speed = Some(WaveSpeed::Fields(
            fields.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Compute `vmax` with a callback.
    pub fn wave_speed<F>(mut self, f: F) -> Self
    where
        F: Fn(&StepContext<'_, B>) -> f64 + Send + Sync + 'static,
    {
        self.wave_speed = Some(WaveSpeed::Custom(Arc::new(f)));
        self
    }

    /// Build the guard, validating configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if no wave-speed source is set, `cfl_max` is not a
    /// positive finite number, or `max_substeps` is zero.
    pub fn build(self) -> Result<CflGuard<B>, String> {
        let wave_speed = self
            .wave_speed
            .ok_or_else(|| "a wave speed source is required".to_string())?;
        if !self.cfl_max.is_finite() || self.cfl_max <= 0.0 {
            return Err(format!(
                "cfl_max must be finite and > 0, got {}",
                self.cfl_max
            ));
        }
        if self.max_substeps == 0 {
            return Err("max_substeps must be >= 1".to_string());
        }
        Ok(CflGuard {
            cfl_max: self.cfl_max,
            max_substeps: self.max_substeps,
            wave_speed,
        })
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for CflGuard<B> {
    type Wrapped = CflGuardStep<B, S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        CflGuardStep {
            inner,
            guard: self.clone(),
            _backend: PhantomData,
        }
    }
}

/// The step produced by [`CflGuard`].
pub struct CflGuardStep<B: Backend, S> {
    inner: S,
    guard: CflGuard<B>,
    _backend: PhantomData<fn() -> B>,
}

impl<B: Backend, S: Step<B>> Step<B> for CflGuardStep<B, S> {
    fn name(&self) -> &str {
        CFL_GUARD
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let cfl_max = self.guard.cfl_max;
        let vmax = self.guard.wave_speed.eval(ctx);
        if !vmax.is_finite() || vmax < 0.0 {
            return Err(StepError::numerical(
                CFL_GUARD,
                None,
                format!("wave speed must be finite and >= 0, got {vmax}"),
            ));
        }
        let dx = grid::dx_min(ctx.params()).unwrap_or(1.0);
        if !dx.is_finite() || dx < 0.0 {
            return Err(StepError::numerical(
                CFL_GUARD,
                None,
                format!("grid.dx_min must be finite and >= 0, got {dx}"),
            ));
        }
        let dt = ctx.dt();
        let cfl = if dx == 0.0 { 0.0 } else { vmax * dt / dx };

        if cfl <= cfl_max || dx == 0.0 || vmax == 0.0 || dt == 0.0 {
            let mut out = self.inner.step(ctx)?;
            out.diag.record_middleware(
                CFL_GUARD,
                json!({ "cfl": cfl, "n_substeps": 1, "vmax": vmax, "dx": dx, "dt": dt }),
            );
            return Ok(out);
        }

        let limit = self.guard.max_substeps;
        let needed = (cfl / cfl_max).ceil();
        if needed.is_nan() || needed > limit as f64 {
            return Err(StepError::numerical(
                CFL_GUARD,
                None,
                format!("cfl {cfl} needs {needed} substeps, limit is {limit}"),
            ));
        }
        let n_sub = (needed as u64).max(1);
        let dt_sub = dt / n_sub as f64;
        tracing::debug!(cfl, n_sub, dt_sub, "substepping");

        let mut state = ctx.state().clone();
        let mut diag = Diag::new();
        for _ in 0..n_sub {
            let out = self.inner.step(&ctx.with_state(&state).with_dt(dt_sub))?;
            state = out.state;
            diag.absorb(out.diag);
        }
        diag.record_middleware(
            CFL_GUARD,
            json!({
                "cfl": cfl,
                "n_substeps": n_sub,
                "vmax": vmax,
                "dx": dx,
                "dt": dt,
                "dt_sub": dt_sub,
            }),
        );
        Ok(StepOutput::with_diag(state, diag))
    }
}
