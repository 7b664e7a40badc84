//! Test utilities and fixtures for Stratus development.
//!
//! Provides a reference [`VecBackend`] over shared `f64` slices, record
//! builders ([`field`], [`record`]), step fixtures ([`IdentityStep`],
//! [`ShiftStep`], [`ForcedStep`], [`FailingStep`]), hook fixtures
//! ([`RecordingHook`], [`FailingHook`]) and in-memory writers for hook
//! output ([`SharedBuffer`], [`BrokenWriter`]).

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod fixtures;
pub mod hooks;
pub mod io;

pub use backend::{field, record, values, VecArray, VecBackend};
pub use fixtures::{CallCounter, FailingStep, ForcedStep, IdentityStep, ShiftStep};
pub use hooks::{FailingHook, Observation, RecordingHook};
pub use io::{BrokenWriter, SharedBuffer};
