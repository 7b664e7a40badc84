//! The numeric backend capability interface.
//!
//! Steps, middleware, and hooks never touch array memory directly. They
//! go through a [`Backend`] handle, so the same composed step runs
//! unmodified against any array library that implements this trait.

use std::fmt;

/// Minimal array capabilities the framework and its library middleware need.
///
/// The handle is shared read-only for the whole run; implementations
/// must not rely on being reinitialized between steps. Any internal
/// parallelism a backend uses for a single operation is invisible here.
pub trait Backend {
    /// Opaque array handle. Cloning should be cheap (reference-counted
    /// storage is typical) so unmodified fields can be shared between
    /// successive states.
    type Array: Clone + fmt::Debug + PartialEq;

    /// Short identifier recorded into params at initialization.
    fn name(&self) -> &str;

    /// Number of elements in `a`.
    fn len(&self, a: &Self::Array) -> usize;

    /// A one-element array holding `value`.
    fn scalar(&self, value: f64) -> Self::Array;

    /// A 1-D array holding `data`.
    fn from_vec(&self, data: Vec<f64>) -> Self::Array;

    /// An array shaped like `like` with every element set to `value`.
    fn full_like(&self, like: &Self::Array, value: f64) -> Self::Array;

    /// An array shaped like `like` filled with zeros.
    fn zeros_like(&self, like: &Self::Array) -> Self::Array {
        self.full_like(like, 0.0)
    }

    /// Element-wise `a + b`.
    fn add(&self, a: &Self::Array, b: &Self::Array) -> Self::Array;

    /// Element-wise `a - b`.
    fn sub(&self, a: &Self::Array, b: &Self::Array) -> Self::Array;

    /// Element-wise `a * b`.
    fn mul(&self, a: &Self::Array, b: &Self::Array) -> Self::Array;

    /// Element-wise `a * k`.
    fn scale(&self, a: &Self::Array, k: f64) -> Self::Array;

    /// Element-wise `a + k`.
    fn add_scalar(&self, a: &Self::Array, k: f64) -> Self::Array;

    /// Element-wise `max(a, lower)`.
    fn maximum_scalar(&self, a: &Self::Array, lower: f64) -> Self::Array;

    /// Element-wise `min(a, upper)`.
    fn minimum_scalar(&self, a: &Self::Array, upper: f64) -> Self::Array;

    /// Periodic shift along the flattened axis: `out[i] = a[(i - shift) mod n]`.
    fn roll(&self, a: &Self::Array, shift: isize) -> Self::Array;

    /// Sum of all elements.
    fn sum(&self, a: &Self::Array) -> f64;

    /// Smallest element, or `None` for an empty array.
    fn min(&self, a: &Self::Array) -> Option<f64>;

    /// Largest element, or `None` for an empty array.
    fn max(&self, a: &Self::Array) -> Option<f64>;

    /// Whether every element is finite.
    fn all_finite(&self, a: &Self::Array) -> bool;
}
