//! Global conservation fixers.
//!
//! Both compare a total computed from the step's input state with the
//! same total over its output and adjust the output to restore it.
//! [`EnergyFix`] restores a weighted sum with a uniform additive shift of
//! one target field; [`ConservationProjection`] restores each field's own
//! total by rescaling it.

use serde_json::{json, Map, Value as Json};
use stratus_core::{Backend, State, StepError, Value};
use stratus_step::{Middleware, Step, StepContext, StepOutput};

use crate::grid;

/// Middleware name recorded by [`EnergyFix`].
pub const ENERGY_FIX: &str = "energy_fix";

/// Middleware name recorded by [`ConservationProjection`].
pub const CONSERVATION_PROJECTION: &str = "conservation_projection";

// ── EnergyFix ───────────────────────────────────────────────────

/// Restore `E = sum_f w_f * total(f)` after the inner step by adding a
/// constant to every element of the target field.
///
/// Build with [`EnergyFix::builder`].
#[derive(Clone, Debug, PartialEq)]
pub struct EnergyFix {
    terms: Vec<(String, f64)>,
    target: String,
}

/// Builder for [`EnergyFix`].
#[derive(Clone, Debug)]
pub struct EnergyFixBuilder {
    terms: Vec<(String, f64)>,
    target: Option<String>,
}

impl EnergyFix {
    /// Start configuring. With no terms added the budget is `T` alone,
    /// weight 1, corrected through `T`.
    pub fn builder() -> EnergyFixBuilder {
        EnergyFixBuilder {
            terms: Vec::new(),
            target: None,
        }
    }

    fn energy<B: Backend>(&self, backend: &B, state: &State<B::Array>) -> f64 {
        self.terms
            .iter()
            .filter_map(|(name, w)| Some(w * grid::total(backend, grid::array(state, name)?)))
            .sum()
    }
}

impl EnergyFixBuilder {
    /// Add `weight * total(field)` to the budget.
    pub fn term(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.terms.push((field.into(), weight));
        self
    }

    /// Field that absorbs the correction (default: the first term).
    pub fn target(mut self, field: impl Into<String>) -> Self {
        self.target = Some(field.into());
        self
    }

    /// Build the fixer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a weight is not finite, or the target is not a
    /// term with non-zero weight.
    pub fn build(self) -> Result<EnergyFix, String> {
        let terms = if self.terms.is_empty() {
            vec![("T".to_string(), 1.0)]
        } else {
            self.terms
        };
        if let Some((name, w)) = terms.iter().find(|(_, w)| !w.is_finite()) {
            return Err(format!("weight of '{name}' must be finite, got {w}"));
        }
        let target = match self.target {
            Some(t) => t,
            None => terms[0].0.clone(),
        };
        match terms.iter().find(|(name, _)| *name == target) {
            Some((_, w)) if *w != 0.0 => {}
            Some(_) => return Err(format!("target '{target}' has zero weight")),
            None => return Err(format!("target '{target}' is not a budget term")),
        }
        Ok(EnergyFix { terms, target })
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for EnergyFix {
    type Wrapped = EnergyFixStep<S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        EnergyFixStep {
            inner,
            config: self.clone(),
        }
    }
}

/// The step produced by [`EnergyFix`].
#[derive(Debug)]
pub struct EnergyFixStep<S> {
    inner: S,
    config: EnergyFix,
}

impl<B: Backend, S: Step<B>> Step<B> for EnergyFixStep<S> {
    fn name(&self) -> &str {
        ENERGY_FIX
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let b = ctx.backend();
        let cfg = &self.config;
        let before = cfg.energy(b, ctx.state());
        let mut out = self.inner.step(ctx)?;
        let after = cfg.energy(b, &out.state);
        if !before.is_finite() || !after.is_finite() {
            return Err(StepError::numerical(
                ENERGY_FIX,
                None,
                format!("energy budget not finite (before {before}, after {after})"),
            ));
        }

        let target = grid::array(&out.state, &cfg.target).ok_or_else(|| {
            StepError::execution(
                ENERGY_FIX,
                format!("target field '{}' missing or not an array", cfg.target),
            )
        })?;
        let weight = cfg
            .terms
            .iter()
            .find(|(name, _)| *name == cfg.target)
            .map_or(1.0, |(_, w)| *w);
        let n = b.len(target);
        let correction = if n == 0 {
            0.0
        } else {
            (before - after) / (weight * n as f64)
        };
        if correction != 0.0 {
            tracing::debug!(field = %cfg.target, correction, "energy correction");
            let fixed = b.add_scalar(target, correction);
            out.state.insert(cfg.target.clone(), Value::Array(fixed));
        }

        let terms: Vec<&str> = cfg.terms.iter().map(|(n, _)| n.as_str()).collect();
        out.diag.record_middleware(
            ENERGY_FIX,
            json!({
                "target": cfg.target,
                "terms": terms,
                "before": before,
                "after": after,
                "correction": correction,
            }),
        );
        Ok(out)
    }
}

// ── ConservationProjection ──────────────────────────────────────

/// Rescale each listed field so its total matches the pre-step total.
///
/// A field whose stepped total is zero while its input total is not
/// cannot be projected and fails the step. Fields absent from either
/// state are skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConservationProjection {
    vars: Vec<String>,
}

impl ConservationProjection {
    /// Conserve the totals of `vars`.
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

impl Default for ConservationProjection {
    /// Conserves `q`.
    fn default() -> Self {
        Self::new(["q"])
    }
}

impl<B: Backend, S: Step<B>> Middleware<B, S> for ConservationProjection {
    type Wrapped = ConservationProjectionStep<S>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        ConservationProjectionStep {
            inner,
            vars: self.vars.clone(),
        }
    }
}

/// The step produced by [`ConservationProjection`].
#[derive(Debug)]
pub struct ConservationProjectionStep<S> {
    inner: S,
    vars: Vec<String>,
}

impl<B: Backend, S: Step<B>> Step<B> for ConservationProjectionStep<S> {
    fn name(&self) -> &str {
        CONSERVATION_PROJECTION
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        let b = ctx.backend();
        let totals: Vec<Option<f64>> = self
            .vars
            .iter()
            .map(|v| grid::array(ctx.state(), v).map(|a| grid::total(b, a)))
            .collect();

        let mut out = self.inner.step(ctx)?;
        let mut scales = Map::new();
        for (var, before) in self.vars.iter().zip(totals) {
            let (Some(before), Some(x)) = (before, grid::array(&out.state, var)) else {
                continue;
            };
            let after = grid::total(b, x);
            let factor = if after == before {
                1.0
            } else if after == 0.0 {
                return Err(StepError::numerical(
                    CONSERVATION_PROJECTION,
                    Some(var.as_str()),
                    format!("cannot rescale zero total to {before}"),
                ));
            } else {
                before / after
            };
            if !factor.is_finite() {
                return Err(StepError::numerical(
                    CONSERVATION_PROJECTION,
                    Some(var.as_str()),
                    format!("non-finite projection factor (before {before}, after {after})"),
                ));
            }
            if factor != 1.0 {
                let projected = b.scale(x, factor);
                out.state.insert(var.clone(), Value::Array(projected));
            }
            scales.insert(var.clone(), Json::from(factor));
        }
        out.diag.record_middleware(
            CONSERVATION_PROJECTION,
            json!({ "vars": self.vars, "scales": scales }),
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::Record;
    use stratus_step::StepExt;
    use stratus_test_utils::{field, record, values, ShiftStep, VecArray, VecBackend};

    fn total(out: &StepOutput<VecArray>, name: &str) -> f64 {
        values(&out.state[name]).unwrap().iter().sum()
    }

    #[test]
    fn energy_fix_restores_weighted_total() {
        let fix = EnergyFix::builder()
            .term("T", 2.0)
            .term("q", 1.0)
            .build()
            .unwrap();
        // shift adds 1 to each of 4 q cells: budget grows by 4
        let step = StepExt::<VecBackend>::with(ShiftStep::new("shift", "q", 1.0), fix);
        let state = record(&[("T", &[1.0, 1.0]), ("q", &[0.0, 0.0, 0.0, 0.0])]);
        let (forcing, params) = (Record::new(), Record::new());
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        let out = Step::<VecBackend>::step(&step, &ctx).unwrap();
        // 2 * 2 cells * correction = -4
        assert_eq!(out.state["T"], field(&[0.0, 0.0]));
        assert_eq!(2.0 * total(&out, "T") + total(&out, "q"), 4.0);
        let rec = out.diag.middleware_record(ENERGY_FIX).unwrap();
        assert_eq!(rec.get("correction"), Some(&json!(-1.0)));
        assert_eq!(rec.get("before"), Some(&json!(4.0)));
    }

    #[test]
    fn energy_fix_builder_checks_target() {
        assert!(EnergyFix::builder().build().is_ok());
        assert!(EnergyFix::builder().term("T", 1.0).target("q").build().is_err());
        assert!(EnergyFix::builder().term("T", 0.0).build().is_err());
        assert!(EnergyFix::builder().term("T", f64::INFINITY).build().is_err());
    }

    #[test]
    fn projection_restores_each_total() {
        let step = StepExt::<VecBackend>::with(
            ShiftStep::new("shift", "q", 1.0),
            ConservationProjection::default(),
        );
        let state = record(&[("q", &[1.0, 3.0])]);
        let (forcing, params) = (Record::new(), Record::new());
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);

        let out = Step::<VecBackend>::step(&step, &ctx).unwrap();
        // [2, 4] scaled by 4/6
        assert!((total(&out, "q") - 4.0).abs() < 1e-12);
        let scales = out.diag.middleware_record(CONSERVATION_PROJECTION).unwrap();
        let factor = scales.get("scales").unwrap()["q"].as_f64().unwrap();
        assert!((factor - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn projection_cannot_rescale_zero() {
        let step = StepExt::<VecBackend>::with(
            ShiftStep::new("shift", "q", -1.0),
            ConservationProjection::default(),
        );
        let state = record(&[("q", &[1.0])]);
        let (forcing, params) = (Record::new(), Record::new());
        let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);
        let err = Step::<VecBackend>::step(&step, &ctx).unwrap_err();
        assert!(matches!(err, StepError::Numerical { .. }));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use proptest::prelude::prop;

        proptest! {
            #[test]
            fn projection_keeps_positive_totals(
                data in prop::collection::vec(0.1f64..10.0, 1..16),
                delta in -0.05f64..5.0,
            ) {
                let step = StepExt::<VecBackend>::with(
                    ShiftStep::new("shift", "q", delta),
                    ConservationProjection::default(),
                );
                let state = record(&[("q", data.as_slice())]);
                let (forcing, params) = (Record::new(), Record::new());
                let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);
                let out = Step::<VecBackend>::step(&step, &ctx).unwrap();

                let before: f64 = data.iter().sum();
                prop_assert!((total(&out, "q") - before).abs() <= 1e-9 * before);
            }
        }
    }
}
