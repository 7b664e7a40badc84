//! Hook fixtures for driver tests.

use std::sync::{Arc, Mutex, MutexGuard};

use stratus_core::{Backend, MiddlewareRecord, RequirementReport, State};
use stratus_engine::{Hook, HookError, StepEvent};

/// One observed step, minus wall-clock time (which never repeats).
#[derive(Clone, Debug, PartialEq)]
pub struct Observation<A> {
    pub index: u64,
    pub state: State<A>,
    pub middleware: Vec<MiddlewareRecord>,
    pub requirements: Vec<RequirementReport>,
    /// Whether the driver attached a step time before the hook ran.
    pub timed: bool,
}

/// Records every event it sees. Clones share the same log, so a clone
/// kept by the test can inspect what the driver's copy recorded.
pub struct RecordingHook<B: Backend> {
    name: String,
    log: Arc<Mutex<Vec<Observation<B::Array>>>>,
}

impl<B: Backend> Clone for RecordingHook<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            log: Arc::clone(&self.log),
        }
    }
}

impl<B: Backend> RecordingHook<B> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Observation<B::Array>>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of everything recorded so far.
    pub fn observations(&self) -> Vec<Observation<B::Array>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn indices(&self) -> Vec<u64> {
        self.lock().iter().map(|o| o.index).collect()
    }
}

impl<B: Backend> Hook<B> for RecordingHook<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        self.lock().push(Observation {
            index: event.index,
            state: event.state.clone(),
            middleware: event.diag.middleware.clone(),
            requirements: event.diag.requirements.clone(),
            timed: event.diag.timings.step_sec.is_some(),
        });
        Ok(())
    }
}

/// Fails when observing step `fail_at`, succeeds otherwise.
#[derive(Clone, Debug)]
pub struct FailingHook {
    pub name: String,
    pub fail_at: u64,
}

impl FailingHook {
    pub fn new(name: impl Into<String>, fail_at: u64) -> Self {
        Self {
            name: name.into(),
            fail_at,
        }
    }
}

impl<B: Backend> Hook<B> for FailingHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        if event.index == self.fail_at {
            return Err(HookError::failed(format!(
                "deliberate failure at step {}",
                event.index
            )));
        }
        Ok(())
    }
}
