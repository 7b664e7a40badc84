//! Per-step forcing sources.
//!
//! A [`ForcingSource`] yields a fresh forcing record for each step index.
//! Forcing is never carried forward: the driver asks for step `k`'s
//! forcing immediately before invoking the step.

use std::error::Error;
use std::fmt;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use stratus_core::{Backend, Forcing, Record, Value};

/// Supplies forcing by step index.
pub trait ForcingSource<A> {
    /// Forcing for step `index`.
    fn forcing(&mut self, index: u64) -> Result<Forcing<A>, ForcingError>;
}

impl<A, F> ForcingSource<A> for F
where
    F: FnMut(u64) -> Forcing<A>,
{
    fn forcing(&mut self, index: u64) -> Result<Forcing<A>, ForcingError> {
        Ok(self(index))
    }
}

/// Empty forcing on every step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoForcing;

impl<A> ForcingSource<A> for NoForcing {
    fn forcing(&mut self, _index: u64) -> Result<Forcing<A>, ForcingError> {
        Ok(Record::new())
    }
}

/// Forcing drawn from an iterator, one item per step. Once the iterator
/// is exhausted every further step gets empty forcing.
#[derive(Clone, Debug)]
pub struct FromIter<I> {
    iter: I,
    exhausted_at: Option<u64>,
}

impl<I> FromIter<I> {
    /// Wrap any iterator of forcing records.
    pub fn new<T: IntoIterator<IntoIter = I>>(items: T) -> Self {
        Self {
            iter: items.into_iter(),
            exhausted_at: None,
        }
    }

    /// The first step index that received empty forcing because the
    /// iterator ran out, if that has happened.
    pub fn exhausted_at(&self) -> Option<u64> {
        self.exhausted_at
    }
}

impl<A, I> ForcingSource<A> for FromIter<I>
where
    I: Iterator<Item = Forcing<A>>,
{
    fn forcing(&mut self, index: u64) -> Result<Forcing<A>, ForcingError> {
        match self.iter.next() {
            Some(f) => Ok(f),
            None => {
                if self.exhausted_at.is_none() {
                    tracing::debug!(index, "forcing iterator exhausted, using empty forcing");
                    self.exhausted_at = Some(index);
                }
                Ok(Record::new())
            }
        }
    }
}

// ── Noise forcing ───────────────────────────────────────────────

/// Deterministic uniform noise in one forcing field.
///
/// Step `k` draws `len` samples in `[-amplitude, amplitude]` from a
/// ChaCha8 RNG seeded with `seed XOR k`, so the same configuration always
/// produces the same sequence and any single step can be regenerated
/// without replaying earlier ones.
///
/// Constructed via [`NoiseForcing::builder`].
#[derive(Clone, Debug)]
pub struct NoiseForcing<B> {
    backend: B,
    field: String,
    len: usize,
    amplitude: f64,
    seed: u64,
}

/// Builder for [`NoiseForcing`].
///
/// Required: `field` and `len`.
#[derive(Debug)]
pub struct NoiseForcingBuilder<B> {
    backend: B,
    field: Option<String>,
    len: Option<usize>,
    amplitude: f64,
    seed: u64,
}

impl<B: Backend> NoiseForcing<B> {
    /// Start configuring a noise source that builds arrays with `backend`.
    pub fn builder(backend: B) -> NoiseForcingBuilder<B> {
        NoiseForcingBuilder {
            backend,
            field: None,
            len: None,
            amplitude: 1.0,
            seed: 0,
        }
    }

    fn samples(&self, index: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ index);
        (0..self.len)
            .map(|_| (rng.random::<f64>() * 2.0 - 1.0) * self.amplitude)
            .collect()
    }
}

impl<B: Backend> NoiseForcingBuilder<B> {
    /// Name of the forcing field to populate.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Number of samples per step.
    pub fn len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    /// Half-range of the uniform distribution (default: 1.0). Must be >= 0.
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// RNG seed (default: 0).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the source, validating configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `field` or `len` is unset, or if `amplitude` is
    /// negative or not finite.
    pub fn build(self) -> Result<NoiseForcing<B>, String> {
        let field = self.field.ok_or_else(|| "field is required".to_string())?;
        let len = self.len.ok_or_else(|| "len is required".to_string())?;
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(format!(
                "amplitude must be finite and >= 0, got {}",
                self.amplitude
            ));
        }
        Ok(NoiseForcing {
            backend: self.backend,
            field,
            len,
            amplitude: self.amplitude,
            seed: self.seed,
        })
    }
}

impl<B: Backend> ForcingSource<B::Array> for NoiseForcing<B> {
    fn forcing(&mut self, index: u64) -> Result<Forcing<B::Array>, ForcingError> {
        let data = self.backend.from_vec(self.samples(index));
        let mut out = Record::new();
        out.insert(self.field.clone(), Value::Array(data));
        Ok(out)
    }
}

// ── ForcingError ────────────────────────────────────────────────

/// A forcing source could not produce forcing for a step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForcingError {
    /// Human-readable description.
    pub reason: String,
}

impl ForcingError {
    /// Construct from a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ForcingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forcing unavailable: {}", self.reason)
    }
}

impl Error for ForcingError {}
