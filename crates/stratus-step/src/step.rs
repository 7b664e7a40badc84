//! The [`Step`] trait and its execution context.
//!
//! A step advances state by one timestep:
//! `(state, forcing, params, dt, backend) -> (new_state, diag)`.
//! Middleware and the requirements guard are themselves steps that wrap
//! an inner step, so an arbitrarily deep chain is still just a `Step`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use stratus_core::{Backend, Diag, Forcing, Params, State, StepError};

use crate::requirements::Requirement;

/// Borrowed inputs for one step invocation.
///
/// Every input is a shared reference: a step cannot mutate the caller's
/// state, forcing, or params. Wrappers that change what the inner step
/// sees (a substepping controller shrinking `dt`, say) build a new
/// context with [`with_dt`](Self::with_dt) or [`with_state`](Self::with_state).
pub struct StepContext<'a, B: Backend> {
    state: &'a State<B::Array>,
    forcing: &'a Forcing<B::Array>,
    params: &'a Params<B::Array>,
    dt: f64,
    backend: &'a B,
}

impl<'a, B: Backend> StepContext<'a, B> {
    /// Construct a context.
    ///
    /// Typically called by the driver. Tests construct contexts directly.
    pub fn new(
        state: &'a State<B::Array>,
        forcing: &'a Forcing<B::Array>,
        params: &'a Params<B::Array>,
        dt: f64,
        backend: &'a B,
    ) -> Self {
        Self {
            state,
            forcing,
            params,
            dt,
            backend,
        }
    }

    /// Current model state.
    pub fn state(&self) -> &'a State<B::Array> {
        self.state
    }

    /// Forcing for this step.
    pub fn forcing(&self) -> &'a Forcing<B::Array> {
        self.forcing
    }

    /// Run parameters.
    pub fn params(&self) -> &'a Params<B::Array> {
        self.params
    }

    /// Timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Numeric backend.
    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Same inputs with a different state, e.g. the output of a previous
    /// substep.
    pub fn with_state<'b>(&self, state: &'b State<B::Array>) -> StepContext<'b, B>
    where
        'a: 'b,
    {
        StepContext {
            state,
            forcing: self.forcing,
            params: self.params,
            dt: self.dt,
            backend: self.backend,
        }
    }

    /// Same inputs with a different timestep.
    pub fn with_dt(&self, dt: f64) -> Self {
        Self { dt, ..*self }
    }
}

impl<B: Backend> Clone for StepContext<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for StepContext<'_, B> {}

impl<B: Backend> fmt::Debug for StepContext<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("state_keys", &self.state.keys().collect::<Vec<_>>())
            .field("forcing_keys", &self.forcing.keys().collect::<Vec<_>>())
            .field("dt", &self.dt)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Result of a successful step: the next state and its diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput<A> {
    /// The next state. May share array handles with the input.
    pub state: State<A>,
    /// Diagnostics for this invocation.
    pub diag: Diag,
}

impl<A> StepOutput<A> {
    /// Output with empty diagnostics.
    pub fn new(state: State<A>) -> Self {
        Self {
            state,
            diag: Diag::new(),
        }
    }

    /// Output with the given diagnostics.
    pub fn with_diag(state: State<A>, diag: Diag) -> Self {
        Self { state, diag }
    }
}

/// A unit of time advancement.
///
/// # Contract
///
/// - `step()` is a function of its context: no hidden process-wide
///   mutable state, and all numerics go through `ctx.backend()`.
/// - Inputs arrive by shared reference and must not be mutated through
///   interior mutability.
/// - Wrappers return their inner step from [`wrapped`](Self::wrapped) so
///   that declared requirements can be discovered through any number of
///   layers.
///
/// # Object safety
///
/// This trait is object-safe; dynamic chains are built as
/// [`BoxStep<B>`].
///
/// # Examples
///
/// ```
/// use stratus_core::{Backend, StepError};
/// use stratus_step::{Step, StepContext, StepOutput};
///
/// struct Persist;
///
/// impl<B: Backend> Step<B> for Persist {
///     fn name(&self) -> &str { "persist" }
///
///     fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
///         Ok(StepOutput::new(ctx.state().clone()))
///     }
/// }
/// ```
pub trait Step<B: Backend>: Send {
    /// Human-readable name used in error context and logging.
    fn name(&self) -> &str;

    /// Preconditions this step declares on its inputs.
    ///
    /// Default: none.
    fn requirements(&self) -> &[Requirement<B::Array>] {
        &[]
    }

    /// The inner step, if this step wraps one.
    ///
    /// Default: `None`.
    fn wrapped(&self) -> Option<&dyn Step<B>> {
        None
    }

    /// Advance the state by `ctx.dt()`.
    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError>;
}

/// A type-erased step.
pub type BoxStep<B> = Box<dyn Step<B>>;

impl<B: Backend, S: Step<B> + ?Sized> Step<B> for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn requirements(&self) -> &[Requirement<B::Array>] {
        (**self).requirements()
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        (**self).wrapped()
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        (**self).step(ctx)
    }
}

impl<B: Backend, S: Step<B> + Sync + ?Sized> Step<B> for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn requirements(&self) -> &[Requirement<B::Array>] {
        (**self).requirements()
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        (**self).wrapped()
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        (**self).step(ctx)
    }
}

// ── Closure steps ───────────────────────────────────────────────

/// A step backed by a closure. Built with [`step_fn`].
pub struct FnStep<B, F> {
    name: String,
    f: F,
    _backend: PhantomData<fn() -> B>,
}

/// Lift a closure with the step signature into a [`Step`].
///
/// ```
/// use stratus_core::Backend;
/// use stratus_step::{step_fn, Step, StepOutput};
///
/// fn identity<B: Backend>() -> impl Step<B> {
///     step_fn("identity", |ctx| Ok(StepOutput::new(ctx.state().clone())))
/// }
/// ```
pub fn step_fn<B, F>(name: impl Into<String>, f: F) -> FnStep<B, F>
where
    B: Backend,
    F: Fn(&StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> + Send,
{
    FnStep {
        name: name.into(),
        f,
        _backend: PhantomData,
    }
}

impl<B, F> Step<B> for FnStep<B, F>
where
    B: Backend,
    F: Fn(&StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        (self.f)(ctx)
    }
}

impl<B, F> fmt::Debug for FnStep<B, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}
