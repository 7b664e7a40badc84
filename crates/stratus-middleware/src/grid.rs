//! Backend-neutral grid operators shared by the middleware.
//!
//! Arrays are treated as 1-D periodic fields in index space.

use stratus_core::{Backend, Params, State, StepError, Value};

/// Periodic second difference `a[i-1] + a[i+1] - 2 a[i]`, divided by `dx²`.
pub fn laplacian<B: Backend>(backend: &B, a: &B::Array, dx: f64) -> B::Array {
    let left = backend.roll(a, 1);
    let right = backend.roll(a, -1);
    let sum = backend.add(&left, &right);
    let lap = backend.sub(&sum, &backend.scale(a, 2.0));
    if dx == 1.0 {
        lap
    } else {
        backend.scale(&lap, 1.0 / (dx * dx))
    }
}

/// Element-wise `max(a, lower)`.
pub fn clamp_min<B: Backend>(backend: &B, a: &B::Array, lower: f64) -> B::Array {
    backend.maximum_scalar(a, lower)
}

/// Element-wise clamp into `[lower, upper]`.
pub fn clamp<B: Backend>(backend: &B, a: &B::Array, lower: f64, upper: f64) -> B::Array {
    backend.minimum_scalar(&backend.maximum_scalar(a, lower), upper)
}

/// Sum of all elements.
pub fn total<B: Backend>(backend: &B, a: &B::Array) -> f64 {
    backend.sum(a)
}

/// `params.grid.dx_min`, if present and numeric.
pub fn dx_min<A>(params: &Params<A>) -> Option<f64> {
    params
        .get("grid")
        .and_then(Value::as_record)
        .and_then(|g| g.get("dx_min"))
        .and_then(Value::as_f64)
}

/// The array stored under `name`, `None` when absent or not an array.
pub(crate) fn array<'s, A>(state: &'s State<A>, name: &str) -> Option<&'s A> {
    state.get(name).and_then(Value::as_array)
}

/// Fail with a numerical error unless every element of `a` is finite.
pub(crate) fn ensure_finite<B: Backend>(
    backend: &B,
    a: &B::Array,
    stage: &str,
    field: &str,
) -> Result<(), StepError> {
    if backend.all_finite(a) {
        Ok(())
    } else {
        Err(StepError::numerical(
            stage,
            Some(field),
            "non-finite values in field",
        ))
    }
}
