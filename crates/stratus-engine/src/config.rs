//! Run configuration and timestep resolution.

use std::error::Error;
use std::fmt;

use stratus_core::{Params, Value, ValueKind};

/// Timestep used when neither the run config nor params set one.
pub const DEFAULT_DT: f64 = 1.0;

// ── RunConfig ───────────────────────────────────────────────────

/// Driver configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Explicit timestep. Overrides `params.time.dt` when set.
    pub dt: Option<f64>,
    /// Keep every step's wall time in the run report (default: true).
    /// Long runs can turn this off and keep only the summary.
    pub keep_step_timings: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt: None,
            keep_step_timings: true,
        }
    }
}

impl RunConfig {
    /// Config with an explicit timestep.
    pub fn with_dt(dt: f64) -> Self {
        Self {
            dt: Some(dt),
            ..Self::default()
        }
    }

    /// Set whether the run report keeps per-step timings.
    pub fn keep_step_timings(mut self, keep: bool) -> Self {
        self.keep_step_timings = keep;
        self
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDt`] if an explicit `dt` is negative or not finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.dt {
            Some(dt) => check_dt(dt),
            None => Ok(()),
        }
    }

    /// The timestep for a run with `params`.
    ///
    /// Priority: explicit `dt`, then `params.time.dt`, then
    /// [`DEFAULT_DT`]. A `time` entry that is not a record, or a record
    /// without `dt`, falls through to the default.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DtNotNumeric`] if `params.time.dt` is present but not a
    /// number; [`ConfigError::InvalidDt`] if the resolved value is negative
    /// or not finite.
    pub fn resolve_dt<A>(&self, params: &Params<A>) -> Result<f64, ConfigError> {
        let dt = match self.dt {
            Some(dt) => dt,
            None => match params
                .get("time")
                .and_then(Value::as_record)
                .and_then(|t| t.get("dt"))
            {
                Some(v) => v.as_f64().ok_or(ConfigError::DtNotNumeric { found: v.kind() })?,
                None => DEFAULT_DT,
            },
        };
        check_dt(dt)?;
        Ok(dt)
    }
}

fn check_dt(dt: f64) -> Result<(), ConfigError> {
    if dt.is_finite() && dt >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDt { value: dt })
    }
}

// ── ConfigError ─────────────────────────────────────────────────

/// Invalid run configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The timestep is negative, NaN, or infinite.
    InvalidDt {
        /// The rejected value.
        value: f64,
    },
    /// `params.time.dt` is present but not numeric.
    DtNotNumeric {
        /// Kind of the value found.
        found: ValueKind,
    },
    /// A configuration section that must be a record is something else.
    NotARecord {
        /// Key of the offending section.
        key: String,
        /// Kind of the value found.
        found: ValueKind,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDt { value } => {
                write!(f, "dt must be finite and non-negative, got {value}")
            }
            Self::DtNotNumeric { found } => {
                write!(f, "params.time.dt must be numeric, got {found}")
            }
            Self::NotARecord { key, found } => {
                write!(f, "config section '{key}' must be a record, got {found}")
            }
        }
    }
}

impl Error for ConfigError {}
