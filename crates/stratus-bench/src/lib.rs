//! Benchmark profiles for the Stratus stepping framework.
//!
//! - [`reference_state`]: a seeded state with `T`, `q`, `u`, `v` fields
//! - [`reference_params`]: grid spacing and timestep for the profiles
//! - [`reference_chain`]: a relaxation core wrapped in the full middleware
//!   stack, innermost conservation to outermost CFL guard
//! - [`guarded`]: the same core behind a requirements guard

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use stratus_core::{Backend, Params, Record, State, Value, ValueKind};
use stratus_middleware::{
    CflGuard, ConservationProjection, EnergyFix, ExtremaLimiter, Hyperdiffusion, Positivity,
};
use stratus_step::{
    step_fn, BoxStep, GuardConfig, Requirement, RequirementGuard, Step, StepContext, StepExt,
    StepOutput,
};
use stratus_test_utils::{VecArray, VecBackend};

/// A state of `cells` cells with deterministic random fields.
pub fn reference_state(cells: usize, seed: u64) -> State<VecArray> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut field = |base: f64, spread: f64| {
        let data: Vec<f64> = (0..cells)
            .map(|_| base + spread * (rng.random::<f64>() * 2.0 - 1.0))
            .collect();
        Value::Array(VecArray::from(data))
    };
    let mut state = Record::new();
    state.insert("T".into(), field(280.0, 10.0));
    state.insert("q".into(), field(0.01, 0.01));
    state.insert("u".into(), field(0.0, 20.0));
    state.insert("v".into(), field(0.0, 20.0));
    state
}

/// `grid.dx_min = 25_000` and `time.dt = 600`.
pub fn reference_params() -> Params<VecArray> {
    let mut grid = Record::new();
    grid.insert("dx_min".into(), Value::Float(25_000.0));
    let mut time = Record::new();
    time.insert("dt".into(), Value::Float(600.0));
    let mut spectral = Record::new();
    spectral.insert("radius".into(), Value::Float(6.371e6));
    let mut params = Record::new();
    params.insert("grid".into(), Value::Record(grid));
    params.insert("time".into(), Value::Record(time));
    params.insert("spectral".into(), Value::Record(spectral));
    params
}

/// Newtonian relaxation of `T` toward 280 K and a small moisture sink.
pub fn relax_core() -> impl Step<VecBackend> + 'static {
    step_fn("relax", |ctx: &StepContext<'_, VecBackend>| {
        let b = ctx.backend();
        let mut state = ctx.state().clone();
        if let Some(Value::Array(t)) = ctx.state().get("T") {
            let anomaly = b.add_scalar(t, -280.0);
            let tendency = b.scale(&anomaly, -ctx.dt() / 86_400.0);
            state.insert("T".into(), Value::Array(b.add(t, &tendency)));
        }
        if let Some(Value::Array(q)) = ctx.state().get("q") {
            state.insert("q".into(), Value::Array(b.add_scalar(q, -1.0e-6)));
        }
        Ok(StepOutput::new(state))
    })
}

/// [`relax_core`] under every reference middleware.
pub fn reference_chain() -> BoxStep<VecBackend> {
    let cfl = CflGuard::builder()
        .cfl_max(0.8)
        .speed_fields(["u", "v"])
        .build()
        .unwrap();
    let hyperdiff = Hyperdiffusion::builder()
        .coeff(1.0e-3)
        .build()
        .unwrap();
    let positivity = Positivity::builder()
        .build()
        .unwrap();
    let energy = EnergyFix::builder()
        .term("T", 1.0)
        .build()
        .unwrap();
    relax_core()
        .with(ConservationProjection::default())
        .with(energy)
        .with(positivity)
        .with(ExtremaLimiter::default())
        .with(hyperdiff)
        .with(cfl)
        .boxed()
}

/// [`relax_core`] behind a guard checking `spectral.radius` and `T`.
pub fn guarded(max_checks: u64) -> RequirementGuard<VecBackend, impl Step<VecBackend>> {
    let config = GuardConfig {
        max_checks,
        ..GuardConfig::default()
    };
    RequirementGuard::with_config(relax_core(), config).with_extra(vec![
        Requirement::params("spectral.radius")
            .kind(ValueKind::Numeric)
            .predicate(|v| v.as_f64().is_some_and(|r| r > 0.0)),
        Requirement::state("T").kind(ValueKind::Array),
    ])
}
