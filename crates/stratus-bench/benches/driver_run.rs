//! Criterion benchmarks for full driver runs.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use stratus_bench::{reference_chain, reference_params, reference_state};
use stratus_engine::{Driver, NoForcing};
use stratus_hooks::{EnergyBudgetHook, TimerHook, WaterBudgetHook};
use stratus_test_utils::VecBackend;

fn bench_run_100_steps_10k(c: &mut Criterion) {
    let params = reference_params();
    let initial = reference_state(10_000, 7);
    c.bench_function("run_100_steps_10k", |b| {
        b.iter(|| {
            let mut driver = Driver::new(reference_chain(), VecBackend)
                .with_hook(TimerHook::new())
                .with_hook(EnergyBudgetHook::new())
                .with_hook(WaterBudgetHook::default());
            let result = driver
                .run(initial.clone(), &params, &mut NoForcing, 100)
                .unwrap();
            black_box(result);
        });
    });
}

fn bench_step_chain_10k(c: &mut Criterion) {
    let params = reference_params();
    let mut driver = Driver::new(reference_chain(), VecBackend);
    let mut state = reference_state(10_000, 7);

    // Warm up so allocation effects are excluded
    state = driver.run(state, &params, &mut NoForcing, 1).unwrap().0;

    c.bench_function("step_chain_10k", |b| {
        b.iter(|| {
            let (next, _) = driver
                .run(state.clone(), &params, &mut NoForcing, 1)
                .unwrap();
            black_box(next);
        });
    });
}

criterion_group!(benches, bench_run_100_steps_10k, bench_step_chain_10k);
criterion_main!(benches);
