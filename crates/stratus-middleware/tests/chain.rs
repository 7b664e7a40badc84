//! Integration test: reference middleware inside real runs.

use serde_json::json;
use stratus_core::{Record, StepError, Value, ValueKind};
use stratus_engine::{Driver, NoForcing, RunErrorKind};
use stratus_middleware::{
    CflGuard, ConservationProjection, EnergyFix, ExtremaLimiter, Hyperdiffusion, Positivity,
    CFL_GUARD, CONSERVATION_PROJECTION, ENERGY_FIX, HYPERDIFF, POSITIVITY,
};
use stratus_step::{
    around, GuardConfig, Requirement, RequirementGuard, Step, StepContext, StepExt,
};
use stratus_test_utils::{
    field, record, values, IdentityStep, RecordingHook, ShiftStep, VecArray, VecBackend,
};

fn total(state: &Record<VecArray>, name: &str) -> f64 {
    values(&state[name]).unwrap().iter().sum()
}

fn nested(entries: &[(&str, f64)]) -> Value<VecArray> {
    let mut inner = Record::new();
    for (k, v) in entries {
        inner.insert((*k).into(), Value::Float(*v));
    }
    Value::Record(inner)
}

// ── Per-step ordering ───────────────────────────────────────────

#[test]
fn floor_then_metadata_records_in_application_order() {
    let floored = StepExt::<VecBackend>::with(
        ShiftStep::new("dry", "q", -1.0),
        Positivity::builder().build().unwrap(),
    );
    let chain = floored.with(around(
        "tag",
        |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            let mut out = inner.step(ctx)?;
            out.diag.record_middleware("tag", json!({ "seen": true }));
            Ok(out)
        },
    ));

    let state = record(&[("q", &[0.5, 2.0])]);
    let (forcing, params) = (Record::new(), Record::new());
    let ctx = StepContext::new(&state, &forcing, &params, 1.0, &VecBackend);
    let out = chain.step(&ctx).unwrap();

    assert_eq!(out.state["q"], field(&[0.0, 1.0]));
    assert_eq!(
        out.diag.middleware_names().collect::<Vec<_>>(),
        vec![POSITIVITY, "tag"]
    );
}

#[test]
fn every_middleware_records_once_per_step() {
    let chain = IdentityStep::<VecBackend>::new("core")
        .with(ConservationProjection::default())
        .with(EnergyFix::builder().build().unwrap())
        .with(Positivity::builder().build().unwrap())
        .with(ExtremaLimiter::default())
        .with(Hyperdiffusion::builder().coeff(1.0e-3).build().unwrap());

    let rec = RecordingHook::<VecBackend>::new("rec");
    let mut driver = Driver::new(chain, VecBackend).with_hook(rec.clone());
    let initial = record(&[("T", &[280.0, 281.0, 279.0]), ("q", &[0.01, 0.02, 0.0])]);
    let (_, report) = driver
        .run(initial, &Record::new(), &mut NoForcing, 3)
        .unwrap();

    for name in [CONSERVATION_PROJECTION, ENERGY_FIX, POSITIVITY, HYPERDIFF] {
        assert_eq!(report.middleware_count(name), 3, "{name}");
    }
    for obs in rec.observations() {
        assert_eq!(obs.middleware.len(), 5);
    }
}

// ── Conservation across a run ───────────────────────────────────

#[test]
fn projection_holds_moisture_total_under_a_source() {
    let chain = StepExt::<VecBackend>::with(
        ShiftStep::new("moisten", "q", 0.25),
        ConservationProjection::default(),
    );
    let rec = RecordingHook::<VecBackend>::new("rec");
    let mut driver = Driver::new(chain, VecBackend).with_hook(rec.clone());

    let (state, report) = driver
        .run(record(&[("q", &[1.0, 2.0, 3.0])]), &Record::new(), &mut NoForcing, 10)
        .unwrap();

    assert!((total(&state, "q") - 6.0).abs() < 1e-9);
    for obs in rec.observations() {
        assert!((total(&obs.state, "q") - 6.0).abs() < 1e-9);
    }
    assert_eq!(report.middleware_count(CONSERVATION_PROJECTION), 10);
}

#[test]
fn energy_fix_cancels_uniform_heating() {
    let chain = StepExt::<VecBackend>::with(
        ShiftStep::new("heat", "T", 1.0),
        EnergyFix::builder().build().unwrap(),
    );
    let mut driver = Driver::new(chain, VecBackend);
    let initial = record(&[("T", &[280.0, 290.0])]);
    let (state, report) = driver
        .run(initial.clone(), &Record::new(), &mut NoForcing, 5)
        .unwrap();
    assert_eq!(state, initial);
    let last = report.last_diag.unwrap();
    assert_eq!(
        last.middleware_record(ENERGY_FIX).unwrap().get("correction"),
        Some(&json!(-1.0))
    );
}

#[test]
fn hyperdiffusion_conserves_while_floor_holds() {
    let chain = IdentityStep::<VecBackend>::new("core")
        .with(Hyperdiffusion::builder().coeff(0.01).vars(["T", "q"]).build().unwrap())
        .with(Positivity::builder().build().unwrap());
    let mut driver = Driver::new(chain, VecBackend);
    let initial = record(&[("T", &[1.0, 5.0, 2.0, 8.0]), ("q", &[0.0, 1.0, 0.0, 3.0])]);
    let (state, _) = driver
        .run(initial.clone(), &Record::new(), &mut NoForcing, 20)
        .unwrap();

    assert!((total(&state, "T") - total(&initial, "T")).abs() < 1e-9);
    assert!(values(&state["q"]).unwrap().iter().all(|v| *v >= 0.0));
}

// ── CFL substepping ─────────────────────────────────────────────

fn cfl_params() -> Record<VecArray> {
    let mut params = Record::new();
    params.insert("grid".into(), nested(&[("dx_min", 100.0)]));
    params.insert("time".into(), nested(&[("dt", 30.0)]));
    params
}

#[test]
fn cfl_guard_substeps_inside_a_run() {
    // |u| max 12, dx 100, dt 30: cfl 3.6, five substeps at cfl_max 0.8
    let core = ShiftStep::new("warm", "T", 1.0).per_dt();
    let calls = core.counter();
    let chain = core.with(
        CflGuard::<VecBackend>::builder()
            .speed_fields(["u"])
            .build()
            .unwrap(),
    );
    let mut driver = Driver::new(chain, VecBackend);
    let initial = record(&[("T", &[0.0]), ("u", &[10.0, -12.0])]);

    let (state, report) = driver
        .run(initial, &cfl_params(), &mut NoForcing, 2)
        .unwrap();

    assert_eq!(state["T"], field(&[60.0]));
    assert_eq!(calls.get(), 10);
    let rec = report.last_diag.unwrap();
    let cfl = rec.middleware_record(CFL_GUARD).unwrap();
    assert_eq!(cfl.get("n_substeps"), Some(&json!(5)));
    assert_eq!(cfl.get("dt_sub"), Some(&json!(6.0)));
}

#[test]
fn cfl_substep_limit_fails_the_run() {
    let chain = ShiftStep::new("warm", "T", 1.0).per_dt().with(
        CflGuard::<VecBackend>::builder()
            .speed_fields(["u"])
            .max_substeps(3)
            .build()
            .unwrap(),
    );
    let mut driver = Driver::new(chain, VecBackend);
    let err = driver
        .run(
            record(&[("T", &[0.0]), ("u", &[12.0])]),
            &cfl_params(),
            &mut NoForcing,
            2,
        )
        .unwrap_err();
    assert_eq!(err.steps_completed, 0);
    assert!(matches!(
        err.kind,
        RunErrorKind::Step {
            index: 0,
            source: StepError::Numerical { .. }
        }
    ));
}

#[test]
fn guard_reports_survive_substepping() {
    // cfl = 1 * 2 / 1 = 2 at cfl_max 0.5: four substeps per step
    let core = IdentityStep::<VecBackend>::new("core").with_requirements(vec![
        Requirement::params("spectral.radius")
            .kind(ValueKind::Numeric)
            .predicate(|v| v.as_f64().is_some_and(|r| r > 0.0)),
    ]);
    let calls = core.counter();
    let guarded = RequirementGuard::with_config(
        core,
        GuardConfig {
            max_checks: 1,
            raise_on_error: false,
            record_warnings: true,
        },
    );
    let chain = guarded.with(
        CflGuard::builder()
            .cfl_max(0.5)
            .wave_speed(|_: &StepContext<'_, VecBackend>| 1.0)
            .build()
            .unwrap(),
    );

    let mut params = Record::new();
    params.insert("grid".into(), nested(&[("dx_min", 1.0)]));
    params.insert("time".into(), nested(&[("dt", 2.0)]));
    params.insert("spectral".into(), nested(&[("radius", -1.0)]));

    let rec = RecordingHook::<VecBackend>::new("rec");
    let mut driver = Driver::new(chain, VecBackend).with_hook(rec.clone());
    let (_, report) = driver
        .run(record(&[("T", &[1.0])]), &params, &mut NoForcing, 2)
        .unwrap();

    assert_eq!(calls.get(), 8);
    assert_eq!(report.requirement_reports.len(), 1);
    assert_eq!(report.requirement_reports[0].step, 0);
    assert_eq!(report.requirement_reports[0].report.errors[0].path, "spectral.radius");
    let per_step: Vec<usize> = rec.observations().iter().map(|o| o.requirements.len()).collect();
    assert_eq!(per_step, vec![1, 0]);
    assert_eq!(report.middleware_count(CFL_GUARD), 2);
}
