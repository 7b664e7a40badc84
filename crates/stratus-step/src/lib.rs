//! Step contract and middleware composition for Stratus.
//!
//! The [`Step`] trait is the unit of time advancement. Middleware wrap
//! steps into steps, so a composed chain is indistinguishable from a
//! single step to the driver. Requirements declared on any step in a
//! chain are discoverable through [`Step::wrapped`] and checked by
//! [`RequirementGuard`] for a bounded number of invocations.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod guard;
pub mod middleware;
pub mod requirements;
pub mod step;

pub use guard::{GuardConfig, GuardLayer, RequirementGuard};
pub use middleware::{around, compose, Around, AroundStep, Layer, Middleware, Stack, StepExt};
pub use requirements::{
    collect_requirements, requires, validate_requirements, Predicate, Requirement, Requires,
    Validation,
};
pub use step::{step_fn, BoxStep, FnStep, Step, StepContext, StepOutput};
