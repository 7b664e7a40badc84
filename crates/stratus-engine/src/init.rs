//! Building the initial state and params from a configuration record.

use stratus_core::{Backend, Params, Record, State, Value};

use crate::config::ConfigError;

fn section<A: Clone>(cfg: &Record<A>, key: &str) -> Result<Record<A>, ConfigError> {
    match cfg.get(key) {
        None => Ok(Record::new()),
        Some(Value::Record(r)) => Ok(r.clone()),
        Some(other) => Err(ConfigError::NotARecord {
            key: key.to_string(),
            found: other.kind(),
        }),
    }
}

/// Split a configuration record into the initial state and run params.
///
/// `cfg.state0` becomes the state and `cfg.params` the params; either may
/// be absent and defaults to empty. The backend's name is recorded under
/// `params.backend.name`, merging into an existing `params.backend`
/// record or replacing a non-record value there.
///
/// # Errors
///
/// [`ConfigError::NotARecord`] if `state0` or `params` is present but is
/// not a record.
pub fn initialize<B: Backend>(
    cfg: &Record<B::Array>,
    backend: &B,
) -> Result<(State<B::Array>, Params<B::Array>), ConfigError> {
    let state = section(cfg, "state0")?;
    let mut params = section(cfg, "params")?;

    let entry = params
        .entry("backend".to_string())
        .or_insert_with(|| Value::Record(Record::new()));
    if !matches!(entry, Value::Record(_)) {
        tracing::debug!(found = %entry.kind(), "replacing non-record params.backend");
        *entry = Value::Record(Record::new());
    }
    if let Value::Record(b) = entry {
        b.insert("name".into(), Value::Str(backend.name().to_string()));
    }
    Ok((state, params))
}
