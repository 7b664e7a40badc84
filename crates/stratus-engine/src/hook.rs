//! Read-only observers invoked after every completed step.

use std::error::Error;
use std::fmt;
use std::io;
use std::marker::PhantomData;

use stratus_core::{Backend, Diag, Params, State};

/// What a hook sees after step `index` completes.
///
/// Every field is a shared reference; hooks cannot alter state, params,
/// or diagnostics.
pub struct StepEvent<'a, B: Backend> {
    /// Zero-based step index.
    pub index: u64,
    /// State produced by the step.
    pub state: &'a State<B::Array>,
    /// Diagnostics of the step, with timings attached.
    pub diag: &'a Diag,
    /// Run parameters.
    pub params: &'a Params<B::Array>,
    /// Numeric backend.
    pub backend: &'a B,
}

/// An observer of completed steps.
///
/// Hooks may keep their own state (histories, open sinks); they never
/// feed anything back into the run.
pub trait Hook<B: Backend> {
    /// Name used in error context.
    fn name(&self) -> &str;

    /// Observe one completed step. An error aborts the run.
    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError>;
}

impl<B: Backend, H: Hook<B> + ?Sized> Hook<B> for Box<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        (**self).observe(event)
    }
}

/// A hook backed by a closure. Built with [`hook_fn`].
pub struct FnHook<B, F> {
    name: String,
    f: F,
    _backend: PhantomData<fn() -> B>,
}

/// Lift a closure into a [`Hook`].
pub fn hook_fn<B, F>(name: impl Into<String>, f: F) -> FnHook<B, F>
where
    B: Backend,
    F: FnMut(&StepEvent<'_, B>) -> Result<(), HookError>,
{
    FnHook {
        name: name.into(),
        f,
        _backend: PhantomData,
    }
}

impl<B, F> Hook<B> for FnHook<B, F>
where
    B: Backend,
    F: FnMut(&StepEvent<'_, B>) -> Result<(), HookError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        (self.f)(event)
    }
}

// ── HookError ───────────────────────────────────────────────────

/// Failure of a hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookError {
    /// The hook's own logic failed.
    Failed {
        /// Human-readable description.
        reason: String,
    },
    /// Writing to the hook's output sink failed.
    Sink {
        /// Description of the I/O failure.
        reason: String,
    },
}

impl HookError {
    /// Shorthand for [`HookError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "hook failed: {reason}"),
            Self::Sink { reason } => write!(f, "hook sink write failed: {reason}"),
        }
    }
}

impl Error for HookError {}

impl From<io::Error> for HookError {
    fn from(e: io::Error) -> Self {
        Self::Sink {
            reason: e.to_string(),
        }
    }
}
