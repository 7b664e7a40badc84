//! Observational hooks for Stratus runs.
//!
//! [`TimerHook`] records step wall time, [`EnergyBudgetHook`] and
//! [`WaterBudgetHook`] reduce state fields to global totals. Each keeps an
//! in-memory history and can stream one line per step to a [`Sink`] as
//! CSV or NDJSON. A failed write aborts the run with
//! [`HookError::Sink`](stratus_engine::HookError::Sink).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod budget;
pub mod sink;
pub mod timer;

pub use budget::{EnergyBudgetHook, EnergyTotals, WaterBudgetHook};
pub use sink::{OutputFormat, Sink};
pub use timer::TimerHook;
