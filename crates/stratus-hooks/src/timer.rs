//! Per-step wall-time recording.

use serde::Serialize;
use stratus_core::{Backend, Diag};
use stratus_engine::{Hook, HookError, StepEvent};

use crate::sink::{Num, OutputFormat, Sink};

/// Records `diag.timings.step_sec` for every step that carries one.
///
/// Steps without an attached time are skipped entirely: nothing is kept
/// and nothing is written. With a sink, each timed step writes one line:
/// `k,step_sec` in CSV, `{"k":k,"step_sec":s}` in NDJSON (plus the full
/// diagnostics under `"diag"` when [`include_diag`] is set).
///
/// [`include_diag`]: TimerHook::include_diag
#[derive(Debug, Default)]
pub struct TimerHook {
    sink: Option<Sink>,
    include_diag: bool,
    history: Vec<(u64, f64)>,
}

#[derive(Serialize)]
struct TimerLine<'a> {
    k: u64,
    step_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    diag: Option<&'a Diag>,
}

impl TimerHook {
    /// A hook that only keeps in-memory history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write each timing to `sink`.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Include the step's diagnostics in NDJSON lines. Ignored for CSV.
    pub fn include_diag(mut self, include: bool) -> Self {
        self.include_diag = include;
        self
    }

    /// `(step index, seconds)` for every timed step observed.
    pub fn history(&self) -> &[(u64, f64)] {
        &self.history
    }

    /// Sum of recorded step times.
    pub fn total_sec(&self) -> f64 {
        self.history.iter().map(|(_, s)| s).sum()
    }
}

impl<B: Backend> Hook<B> for TimerHook {
    fn name(&self) -> &str {
        "timer"
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        let Some(step_sec) = event.diag.timings.step_sec else {
            return Ok(());
        };
        self.history.push((event.index, step_sec));

        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        match sink.format() {
            OutputFormat::Csv => sink.csv_row([event.index.to_string(), Num(step_sec).to_string()]),
            OutputFormat::Ndjson => sink.json_line(&TimerLine {
                k: event.index,
                step_sec,
                diag: self.include_diag.then_some(event.diag),
            }),
        }
    }
}
