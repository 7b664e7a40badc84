//! Aggregated results of a run.
//!
//! [`RunReport`] folds in each step's diagnostics as the run proceeds.
//! Timing is summarized and, unless disabled, kept per step; middleware
//! records are counted
//! by name; every requirements-guard report is retained with the index
//! of the step that produced it; the last step's full diagnostics are
//! kept verbatim.

use indexmap::IndexMap;
use serde::Serialize;
use stratus_core::{Diag, RequirementReport};

/// Timing summary over all completed steps, in seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimingSummary {
    /// Wall time of each step, in order. Empty when per-step retention is
    /// off; the summary fields are maintained either way.
    pub per_step_sec: Vec<f64>,
    /// Number of steps timed.
    pub count: u64,
    /// Sum of all step times.
    pub total_sec: f64,
    /// Fastest step. Zero before any step completes.
    pub min_sec: f64,
    /// Slowest step. Zero before any step completes.
    pub max_sec: f64,
    /// Mean step time. Zero before any step completes.
    pub mean_sec: f64,
    #[serde(skip)]
    summary_only: bool,
}

impl TimingSummary {
    fn push(&mut self, sec: f64) {
        if self.count == 0 {
            self.min_sec = sec;
            self.max_sec = sec;
        } else {
            self.min_sec = self.min_sec.min(sec);
            self.max_sec = self.max_sec.max(sec);
        }
        if !self.summary_only {
            self.per_step_sec.push(sec);
        }
        self.count += 1;
        self.total_sec += sec;
        self.mean_sec = self.total_sec / self.count as f64;
    }
}

/// A guard report tagged with the step it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepRequirementReport {
    /// Zero-based step index.
    pub step: u64,
    /// The guard's report.
    #[serde(flatten)]
    pub report: RequirementReport,
}

/// Summary of a completed run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Steps that completed, including hook invocation.
    pub steps_completed: u64,
    /// Step timings.
    pub timings: TimingSummary,
    /// Number of middleware records seen per middleware name, in first-seen
    /// order.
    pub middleware_counts: IndexMap<String, u64>,
    /// Every requirements-guard report, in step order.
    pub requirement_reports: Vec<StepRequirementReport>,
    /// Diagnostics of the last completed step.
    pub last_diag: Option<Diag>,
}

impl RunReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty report that keeps per-step timings only when
    /// `keep_per_step` is set.
    pub fn with_step_timings(keep_per_step: bool) -> Self {
        let mut report = Self::default();
        report.timings.summary_only = !keep_per_step;
        report
    }

    /// Fold in the diagnostics of step `index`.
    pub fn record(&mut self, index: u64, diag: Diag) {
        self.timings.push(diag.timings.step_sec.unwrap_or(0.0));
        for rec in &diag.middleware {
            *self.middleware_counts.entry(rec.name.clone()).or_insert(0) += 1;
        }
        self.requirement_reports
            .extend(diag.requirements.iter().cloned().map(|report| StepRequirementReport {
                step: index,
                report,
            }));
        self.steps_completed += 1;
        self.last_diag = Some(diag);
    }

    /// Records appended by middleware `name` across the run.
    pub fn middleware_count(&self, name: &str) -> u64 {
        self.middleware_counts.get(name).copied().unwrap_or(0)
    }
}
