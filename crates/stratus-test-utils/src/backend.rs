//! A reference in-memory backend over `f64` slices.
//!
//! Arrays are reference-counted so cloning a state is cheap and
//! untouched fields share storage between steps. Element-wise operations
//! broadcast length-1 operands; other length mismatches truncate to the
//! shorter operand.

use std::sync::Arc;

use stratus_core::{Backend, Record, Value};

/// Immutable, cheaply cloneable 1-D array.
#[derive(Clone, Debug, PartialEq)]
pub struct VecArray(Arc<[f64]>);

impl VecArray {
    /// Copy `data` into a new array.
    pub fn from_slice(data: &[f64]) -> Self {
        Self(Arc::from(data))
    }

    /// Borrow the elements.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Copy the elements out.
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    /// Whether two handles share storage.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<f64>> for VecArray {
    fn from(v: Vec<f64>) -> Self {
        Self(Arc::from(v))
    }
}

/// The reference backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VecBackend;

impl VecBackend {
    fn map(&self, a: &VecArray, f: impl Fn(f64) -> f64) -> VecArray {
        a.0.iter().map(|&x| f(x)).collect::<Vec<_>>().into()
    }

    fn zip(&self, a: &VecArray, b: &VecArray, f: impl Fn(f64, f64) -> f64) -> VecArray {
        match (a.0.len(), b.0.len()) {
            (_, 1) => self.map(a, |x| f(x, b.0[0])),
            (1, _) => self.map(b, |y| f(a.0[0], y)),
            _ => a
                .0
                .iter()
                .zip(b.0.iter())
                .map(|(&x, &y)| f(x, y))
                .collect::<Vec<_>>()
                .into(),
        }
    }
}

impl Backend for VecBackend {
    type Array = VecArray;

    fn name(&self) -> &str {
        "vec"
    }

    fn len(&self, a: &VecArray) -> usize {
        a.0.len()
    }

    fn scalar(&self, value: f64) -> VecArray {
        VecArray::from_slice(&[value])
    }

    fn from_vec(&self, data: Vec<f64>) -> VecArray {
        data.into()
    }

    fn full_like(&self, like: &VecArray, value: f64) -> VecArray {
        vec![value; like.0.len()].into()
    }

    fn add(&self, a: &VecArray, b: &VecArray) -> VecArray {
        self.zip(a, b, |x, y| x + y)
    }

    fn sub(&self, a: &VecArray, b: &VecArray) -> VecArray {
        self.zip(a, b, |x, y| x - y)
    }

    fn mul(&self, a: &VecArray, b: &VecArray) -> VecArray {
        self.zip(a, b, |x, y| x * y)
    }

    fn scale(&self, a: &VecArray, k: f64) -> VecArray {
        self.map(a, |x| x * k)
    }

    fn add_scalar(&self, a: &VecArray, k: f64) -> VecArray {
        self.map(a, |x| x + k)
    }

    fn maximum_scalar(&self, a: &VecArray, lower: f64) -> VecArray {
        self.map(a, |x| x.max(lower))
    }

    fn minimum_scalar(&self, a: &VecArray, upper: f64) -> VecArray {
        self.map(a, |x| x.min(upper))
    }

    fn roll(&self, a: &VecArray, shift: isize) -> VecArray {
        let n = a.0.len();
        if n == 0 {
            return a.clone();
        }
        let s = shift.rem_euclid(n as isize) as usize;
        (0..n)
            .map(|i| a.0[(i + n - s) % n])
            .collect::<Vec<_>>()
            .into()
    }

    fn sum(&self, a: &VecArray) -> f64 {
        a.0.iter().sum()
    }

    fn min(&self, a: &VecArray) -> Option<f64> {
        a.0.iter().copied().reduce(f64::min)
    }

    fn max(&self, a: &VecArray) -> Option<f64> {
        a.0.iter().copied().reduce(f64::max)
    }

    fn all_finite(&self, a: &VecArray) -> bool {
        a.0.iter().all(|x| x.is_finite())
    }
}

/// An array value holding `data`.
pub fn field(data: &[f64]) -> Value<VecArray> {
    Value::Array(VecArray::from_slice(data))
}

/// The elements of an array value, or `None` for non-arrays.
pub fn values(v: &Value<VecArray>) -> Option<Vec<f64>> {
    v.as_array().map(VecArray::to_vec)
}

/// A record of array fields, in the given order.
pub fn record(fields: &[(&str, &[f64])]) -> Record<VecArray> {
    fields
        .iter()
        .map(|(k, data)| (k.to_string(), field(data)))
        .collect()
}
