//! Reference middleware for the Stratus stepping framework.
//!
//! Every middleware here wraps any [`Step`](stratus_step::Step) and
//! appends exactly one record to the step's diagnostics per call.
//!
//! # Suggested layering (outermost first)
//!
//! 1. [`CflGuard`]: stability, slices `dt` before anything else runs
//! 2. [`Hyperdiffusion`], [`ExtremaLimiter`], [`Positivity`]: per-field fixups
//! 3. [`EnergyFix`], [`ConservationProjection`]: global totals, innermost
//!
//! With [`StepExt::with`](stratus_step::StepExt::with) the innermost layer
//! is applied first, so the chain reads bottom-up.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cfl;
pub mod conservation;
pub mod grid;
pub mod hyperdiff;
pub mod limiter;
pub mod positivity;

pub use cfl::{CflGuard, CflGuardBuilder, CflGuardStep, CFL_GUARD, DEFAULT_MAX_SUBSTEPS};
pub use conservation::{
    ConservationProjection, ConservationProjectionStep, EnergyFix, EnergyFixBuilder,
    EnergyFixStep, CONSERVATION_PROJECTION, ENERGY_FIX,
};
pub use hyperdiff::{Hyperdiffusion, HyperdiffusionBuilder, HyperdiffusionStep, HYPERDIFF};
pub use limiter::{ExtremaLimiter, ExtremaLimiterStep, EXTREMA_LIMITER};
pub use positivity::{Positivity, PositivityBuilder, PositivityStep, POSITIVITY};
