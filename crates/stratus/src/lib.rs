//! Stratus: backend-neutral simulation stepping.
//!
//! This is the facade crate that re-exports the public API of the Stratus
//! sub-crates. A model supplies a [`Backend`](prelude::Backend) for its
//! array type and a core [`Step`](prelude::Step); Stratus wraps the step in
//! middleware, checks declared requirements, drives the time loop, and
//! feeds each result to observational hooks.
//!
//! # Quick start
//!
//! ```rust
//! use stratus::prelude::*;
//! use stratus_test_utils::{record, VecBackend};
//!
//! // Core physics: relax T by one unit per step.
//! let core = step_fn("relax", |ctx: &StepContext<'_, VecBackend>| {
//!     let mut state = ctx.state().clone();
//!     if let Some(Value::Array(t)) = ctx.state().get("T") {
//!         state.insert("T".into(), Value::Array(ctx.backend().add_scalar(t, -1.0)));
//!     }
//!     Ok(StepOutput::new(state))
//! });
//!
//! // Floor T at zero, and check T exists on the first call only.
//! let step = core
//!     .with(Positivity::builder().vars(["T"]).build().unwrap())
//!     .with(GuardLayer::new(GuardConfig { max_checks: 1, ..Default::default() })
//!         .with_extra(vec![Requirement::state("T").kind(ValueKind::Array)]));
//!
//! let mut driver = Driver::new(step, VecBackend).with_hook(WaterBudgetHook::new("T"));
//! let (state, report) = driver
//!     .run(record(&[("T", &[2.0, 0.5])]), &Params::new(), &mut NoForcing, 3)
//!     .unwrap();
//! assert_eq!(state["T"], stratus_test_utils::field(&[0.0, 0.0]));
//! assert_eq!(report.middleware_count("positivity"), 3);
//! assert_eq!(report.requirement_reports.len(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `stratus-core` | Values, records, backend trait, diagnostics, errors |
//! | [`step`] | `stratus-step` | Step contract, composition, requirements, guard |
//! | [`middleware`] | `stratus-middleware` | CFL guard, hyperdiffusion, limiters, fixers |
//! | [`engine`] | `stratus-engine` | Driver, forcing sources, hook trait, run report |
//! | [`hooks`] | `stratus-hooks` | Timer and budget hooks with CSV/NDJSON sinks |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Values, records, the backend trait, diagnostics, and errors (`stratus-core`).
pub use stratus_core as types;

/// The step contract, middleware composition, and requirements (`stratus-step`).
pub use stratus_step as step;

/// Reference middleware (`stratus-middleware`).
pub use stratus_middleware as middleware;

/// The run loop, forcing sources, and the hook trait (`stratus-engine`).
pub use stratus_engine as engine;

/// Timing and budget hooks (`stratus-hooks`).
pub use stratus_hooks as hooks;

/// Common imports for typical Stratus usage.
///
/// ```rust
/// use stratus::prelude::*;
/// ```
pub mod prelude {
    // Core model
    pub use stratus_core::{
        Backend, Diag, Forcing, Location, Params, Record, Severity, State, Value, ValueKind,
        Violation,
    };

    // Errors
    pub use stratus_core::{RequirementError, StepError};

    // Steps and composition
    pub use stratus_step::{
        around, compose, requires, step_fn, BoxStep, GuardConfig, GuardLayer, Middleware,
        Requirement, RequirementGuard, Stack, Step, StepContext, StepExt, StepOutput,
    };

    // Middleware
    pub use stratus_middleware::{
        CflGuard, ConservationProjection, EnergyFix, ExtremaLimiter, Hyperdiffusion, Positivity,
    };

    // Engine
    pub use stratus_engine::{
        initialize, run, Driver, ForcingSource, Hook, HookError, NoForcing, RunConfig, RunError,
        RunReport, StepEvent,
    };

    // Hooks
    pub use stratus_hooks::{EnergyBudgetHook, OutputFormat, Sink, TimerHook, WaterBudgetHook};
}
