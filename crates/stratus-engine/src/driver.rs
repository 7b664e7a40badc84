//! The run loop.
//!
//! Each iteration pulls forcing for step `k`, invokes the (possibly
//! wrapped) step, attaches the step's wall time to its diagnostics, hands
//! the result to every hook in order, and folds the diagnostics into the
//! [`RunReport`]. Execution is strictly sequential; the loop never
//! spawns threads.

use std::error::Error;
use std::fmt;
use std::time::Instant;

use tracing::{debug, error, info};

use stratus_core::{Backend, Params, State, StepError};
use stratus_step::{BoxStep, Step, StepContext};

use crate::config::{ConfigError, RunConfig};
use crate::forcing::{ForcingError, ForcingSource};
use crate::hook::{Hook, HookError, StepEvent};
use crate::report::RunReport;

// ── RunError ────────────────────────────────────────────────────

/// Why a run stopped early.
#[derive(Clone, Debug, PartialEq)]
pub enum RunErrorKind {
    /// The run configuration or resolved timestep was invalid. No step ran.
    Config(ConfigError),
    /// The forcing source failed for step `index`.
    Forcing {
        /// Step index.
        index: u64,
        /// The forcing source's error.
        source: ForcingError,
    },
    /// The step failed at `index`.
    Step {
        /// Step index.
        index: u64,
        /// The step's error.
        source: StepError,
    },
    /// A hook failed while observing step `index`.
    Hook {
        /// Step index.
        index: u64,
        /// Name of the failing hook.
        hook: String,
        /// The hook's error.
        source: HookError,
    },
}

/// A failed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunError {
    /// What failed.
    pub kind: RunErrorKind,
    /// Steps fully completed (step and all hooks) before the failure.
    pub steps_completed: u64,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RunErrorKind::Config(e) => write!(f, "invalid run configuration: {e}"),
            RunErrorKind::Forcing { index, source } => {
                write!(f, "forcing for step {index} failed: {source}")
            }
            RunErrorKind::Step { index, source } => write!(f, "step {index} failed: {source}"),
            RunErrorKind::Hook {
                index,
                hook,
                source,
            } => write!(f, "hook '{hook}' failed at step {index}: {source}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            RunErrorKind::Config(e) => Some(e),
            RunErrorKind::Forcing { source, .. } => Some(source),
            RunErrorKind::Step { source, .. } => Some(source),
            RunErrorKind::Hook { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        Self {
            kind: RunErrorKind::Config(e),
            steps_completed: 0,
        }
    }
}

// ── Run loop ────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn execute<B, S, F, O>(
    step: &S,
    backend: &B,
    config: &RunConfig,
    initial: State<B::Array>,
    params: &Params<B::Array>,
    forcing: &mut F,
    n_steps: u64,
    mut observe: O,
) -> Result<(State<B::Array>, RunReport), RunError>
where
    B: Backend,
    S: Step<B> + ?Sized,
    F: ForcingSource<B::Array> + ?Sized,
    O: FnMut(&StepEvent<'_, B>) -> Result<(), (String, HookError)>,
{
    config.validate()?;
    let dt = config.resolve_dt(params)?;
    info!(
        step = step.name(),
        backend = backend.name(),
        n_steps,
        dt,
        "run starting"
    );

    let mut state = initial;
    let mut report = RunReport::with_step_timings(config.keep_step_timings);
    for index in 0..n_steps {
        let fail = |kind: RunErrorKind| {
            error!(index, step = step.name(), "run aborted");
            RunError {
                kind,
                steps_completed: index,
            }
        };

        let forcing_k = forcing
            .forcing(index)
            .map_err(|source| fail(RunErrorKind::Forcing { index, source }))?;

        let started = Instant::now();
        let ctx = StepContext::new(&state, &forcing_k, params, dt, backend);
        let mut out = step
            .step(&ctx)
            .map_err(|source| fail(RunErrorKind::Step { index, source }))?;
        let step_sec = started.elapsed().as_secs_f64();
        out.diag.timings.step_sec = Some(step_sec);

        let event = StepEvent {
            index,
            state: &out.state,
            diag: &out.diag,
            params,
            backend,
        };
        observe(&event).map_err(|(hook, source)| {
            fail(RunErrorKind::Hook {
                index,
                hook,
                source,
            })
        })?;

        debug!(index, step_sec, "step complete");
        state = out.state;
        report.record(index, out.diag);
    }

    info!(
        steps = report.steps_completed,
        total_sec = report.timings.total_sec,
        "run finished"
    );
    Ok((state, report))
}

/// Run `step` for `n_steps` from `initial`.
///
/// The timestep comes from `params.time.dt`, defaulting to 1.0. Use a
/// [`Driver`] to override it. Hooks are invoked in slice order after
/// every step.
///
/// # Errors
///
/// The first failure of timestep resolution, the forcing source, the
/// step, or a hook, with the number of steps completed before it.
pub fn run<B, S, F>(
    step: &S,
    initial: State<B::Array>,
    params: &Params<B::Array>,
    forcing: &mut F,
    backend: &B,
    n_steps: u64,
    hooks: &mut [&mut dyn Hook<B>],
) -> Result<(State<B::Array>, RunReport), RunError>
where
    B: Backend,
    S: Step<B> + ?Sized,
    F: ForcingSource<B::Array> + ?Sized,
{
    execute(
        step,
        backend,
        &RunConfig::default(),
        initial,
        params,
        forcing,
        n_steps,
        |event| {
            for hook in hooks.iter_mut() {
                hook.observe(event)
                    .map_err(|e| (hook.name().to_string(), e))?;
            }
            Ok(())
        },
    )
}

// ── Driver ──────────────────────────────────────────────────────

/// A reusable run loop owning its step, backend, and hooks.
///
/// ```
/// use stratus_engine::{Driver, NoForcing, RunConfig};
/// use stratus_step::{step_fn, StepContext, StepOutput};
/// use stratus_test_utils::{record, VecBackend};
///
/// let identity = step_fn("identity", |ctx: &StepContext<'_, VecBackend>| {
///     Ok(StepOutput::new(ctx.state().clone()))
/// });
/// let mut driver = Driver::new(identity, VecBackend).with_config(RunConfig::with_dt(60.0));
/// let initial = record(&[("T", &[280.0, 290.0])]);
/// let (state, report) = driver
///     .run(initial.clone(), &Default::default(), &mut NoForcing, 5)
///     .unwrap();
/// assert_eq!(state, initial);
/// assert_eq!(report.steps_completed, 5);
/// ```
pub struct Driver<B: Backend> {
    step: BoxStep<B>,
    backend: B,
    hooks: Vec<Box<dyn Hook<B>>>,
    config: RunConfig,
}

impl<B: Backend> Driver<B> {
    /// A driver for `step` on `backend` with default configuration.
    pub fn new<S: Step<B> + 'static>(step: S, backend: B) -> Self {
        Self {
            step: Box::new(step),
            backend,
            hooks: Vec::new(),
            config: RunConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a hook. Hooks run in the order they were added.
    pub fn with_hook<H: Hook<B> + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// The backend handle.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The composed step.
    pub fn step(&self) -> &dyn Step<B> {
        self.step.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run for `n_steps` from `initial`.
    ///
    /// Hooks keep their state between runs on the same driver; the step
    /// does too (a requirements guard that has exhausted its checks stays
    /// exhausted).
    ///
    /// # Errors
    ///
    /// See [`run`].
    pub fn run<F>(
        &mut self,
        initial: State<B::Array>,
        params: &Params<B::Array>,
        forcing: &mut F,
        n_steps: u64,
    ) -> Result<(State<B::Array>, RunReport), RunError>
    where
        F: ForcingSource<B::Array> + ?Sized,
    {
        let hooks = &mut self.hooks;
        execute(
            self.step.as_ref(),
            &self.backend,
            &self.config,
            initial,
            params,
            forcing,
            n_steps,
            |event| {
                for hook in hooks.iter_mut() {
                    hook.observe(event)
                        .map_err(|e| (hook.name().to_string(), e))?;
                }
                Ok(())
            },
        )
    }
}
