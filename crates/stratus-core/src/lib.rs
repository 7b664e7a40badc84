//! Core types for the Stratus stepping framework.
//!
//! This is the leaf crate of the workspace. It defines the value model
//! that state, params, and forcing are built from, the [`Backend`]
//! capability trait that all numerics go through, dotted-path access,
//! the per-step [`Diag`] record, and the error types a step can raise.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod access;
pub mod backend;
pub mod diag;
pub mod error;
pub mod path;
pub mod value;
pub mod violation;

pub use access::{require, split_keys, take, take_nested, KeyError};
pub use backend::Backend;
pub use diag::{
    Diag, MiddlewareRecord, RequirementReport, ReservedKeyError, Timings, MIDDLEWARE_KEY, REQUIREMENTS_KEY,
    TIMINGS_KEY,
};
pub use error::{RequirementError, StepError};
pub use path::{FieldPath, PathError};
pub use value::{Record, Value, ValueKind};
pub use violation::{Location, Severity, Violation};

/// The evolving model state.
pub type State<A> = Record<A>;

/// Read-only run parameters.
pub type Params<A> = Record<A>;

/// Per-step external inputs.
pub type Forcing<A> = Record<A>;
