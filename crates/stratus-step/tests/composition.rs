//! Integration test: middleware composition order.
//!
//! Every middleware here applies a non-commuting affine map on the way in
//! (`x -> 2x + d`) and another on the way out (`x -> 3x - d`), so any
//! deviation from "later layers are outermost" changes the result.

use proptest::prelude::*;
use serde_json::json;
use stratus_core::{Record, State, StepError, Value};
use stratus_step::{
    around, compose, step_fn, BoxStep, Layer, Stack, Step, StepContext, StepExt, StepOutput,
};
use stratus_test_utils::{field, record, values, VecArray, VecBackend};

fn scalar(state: &State<VecArray>) -> Result<f64, StepError> {
    state
        .get("x")
        .and_then(values)
        .and_then(|v| v.first().copied())
        .ok_or_else(|| StepError::execution("test", "x missing"))
}

fn with_scalar(state: &State<VecArray>, x: f64) -> State<VecArray> {
    let mut next = state.clone();
    next.insert("x".into(), field(&[x]));
    next
}

fn core() -> impl Step<VecBackend> + 'static {
    step_fn("core", |ctx: &StepContext<'_, VecBackend>| {
        let x = scalar(ctx.state())?;
        Ok(StepOutput::new(with_scalar(ctx.state(), x + 100.0)))
    })
}

fn affine(tag: usize, d: f64) -> Box<dyn Layer<VecBackend>> {
    Box::new(around(
        &format!("m{tag}"),
        move |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            let x = scalar(ctx.state())?;
            let pre = with_scalar(ctx.state(), 2.0 * x + d);
            let mut out = inner.step(&ctx.with_state(&pre))?;
            let y = scalar(&out.state)?;
            out.state = with_scalar(&out.state, 3.0 * y - d);
            out.diag.record_middleware(format!("m{tag}"), json!({ "d": d }));
            Ok(out)
        },
    ))
}

/// Closed form of the chain: pre-maps from outermost inward, then the
/// core, then post-maps from innermost outward.
fn expected(x0: f64, deltas: &[f64]) -> f64 {
    let mut x = x0;
    for d in deltas.iter().rev() {
        x = 2.0 * x + d;
    }
    x += 100.0;
    for d in deltas {
        x = 3.0 * x - d;
    }
    x
}

fn run_once(step: &dyn Step<VecBackend>, x0: f64) -> StepOutput<VecArray> {
    let state = record(&[("x", &[x0])]);
    let (forcing, params) = (Record::new(), Record::new());
    let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);
    step.step(&ctx).unwrap()
}

// ── Static vs dynamic composition ───────────────────────────────

#[test]
fn static_and_dynamic_chains_agree() {
    let chained = core()
        .with(around("a", |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            inner.step(ctx)
        }))
        .with(around("b", |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            let mut out = inner.step(ctx)?;
            out.diag.record_middleware("b", json!({}));
            Ok(out)
        }));

    let stack: BoxStep<VecBackend> = Stack::new()
        .push(around("a", |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            inner.step(ctx)
        }))
        .push(around("b", |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            let mut out = inner.step(ctx)?;
            out.diag.record_middleware("b", json!({}));
            Ok(out)
        }))
        .apply(core().boxed());

    let a = run_once(&chained, 1.0);
    let b = run_once(&*stack, 1.0);
    assert_eq!(a.state, b.state);
    assert_eq!(a.diag, b.diag);
    assert_eq!(a.state["x"], field(&[101.0]));
    assert_eq!(stack.name(), "b");
}

#[test]
fn no_layers_is_the_core() {
    let step = compose(core(), Vec::new());
    let out = run_once(&*step, 5.0);
    assert_eq!(out.state["x"], Value::Array(VecArray::from_slice(&[105.0])));
    assert!(out.diag.middleware.is_empty());
}

// ── Property tests ──────────────────────────────────────────────

proptest! {
    #[test]
    fn composed_chain_matches_closed_form(
        x0 in -10i32..10,
        deltas in prop::collection::vec(-5i32..5, 0..6),
    ) {
        let x0 = f64::from(x0);
        let deltas: Vec<f64> = deltas.into_iter().map(f64::from).collect();
        let layers = deltas.iter().enumerate().map(|(i, d)| affine(i, *d)).collect();
        let step = compose(core(), layers);

        let out = run_once(&*step, x0);
        prop_assert_eq!(scalar(&out.state).unwrap(), expected(x0, &deltas));

        // records appear innermost first, i.e. in application order
        let names: Vec<String> = out.diag.middleware_names().map(str::to_string).collect();
        let want: Vec<String> = (0..deltas.len()).map(|i| format!("m{i}")).collect();
        prop_assert_eq!(names, want);
    }

    #[test]
    fn compose_equals_manual_nesting(
        deltas in prop::collection::vec(-5i32..5, 1..5),
    ) {
        let deltas: Vec<f64> = deltas.into_iter().map(f64::from).collect();
        let layers = deltas.iter().enumerate().map(|(i, d)| affine(i, *d)).collect();
        let composed = compose(core(), layers);

        let mut manual: BoxStep<VecBackend> = core().boxed();
        for (i, d) in deltas.iter().enumerate() {
            manual = affine(i, *d).layer(manual);
        }

        let a = run_once(&*composed, 1.0);
        let b = run_once(&*manual, 1.0);
        prop_assert_eq!(a.state, b.state);
        prop_assert_eq!(a.diag, b.diag);
    }
}
