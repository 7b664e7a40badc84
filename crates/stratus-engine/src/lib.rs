//! Run loop for Stratus simulations.
//!
//! [`Driver`] (or the free function [`run`]) advances a composed step for
//! a fixed number of steps, pulling per-step forcing from a
//! [`ForcingSource`], timing each step, and handing every result to the
//! registered [`Hook`]s before folding its diagnostics into a
//! [`RunReport`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod forcing;
pub mod hook;
pub mod init;
pub mod report;

pub use config::{ConfigError, RunConfig, DEFAULT_DT};
pub use driver::{run, Driver, RunError, RunErrorKind};
pub use forcing::{ForcingError, ForcingSource, FromIter, NoForcing, NoiseForcing, NoiseForcingBuilder};
pub use hook::{hook_fn, FnHook, Hook, HookError, StepEvent};
pub use init::initialize;
pub use report::{RunReport, StepRequirementReport, TimingSummary};
