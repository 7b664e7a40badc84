//! Energy and water budget diagnostics.
//!
//! Both hooks reduce state fields to global totals after every step and
//! keep the per-step results in memory. Array fields are summed through
//! the backend; numeric scalars count as themselves; anything else, or a
//! missing field, contributes zero.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use stratus_core::{Backend, State, Value};
use stratus_engine::{Hook, HookError, StepEvent};

use crate::sink::{Num, OutputFormat, Sink};

fn field_total<B: Backend>(backend: &B, state: &State<B::Array>, name: &str) -> f64 {
    match state.get(name) {
        Some(Value::Array(a)) => backend.sum(a),
        Some(v) => v.as_f64().unwrap_or(0.0),
        None => 0.0,
    }
}

// ── Energy ──────────────────────────────────────────────────────

/// Totals per energy term, in term order.
pub type EnergyTotals = IndexMap<String, f64>;

/// Sums groups of state fields into named energy terms.
///
/// Defaults: `dry_static = T`, `latent = q`, `kinetic = u + v`. CSV lines
/// are `k,<term totals in term order>`; NDJSON lines are
/// `{"k":k,"energy":{<term>:<total>,...}}`.
#[derive(Debug)]
pub struct EnergyBudgetHook {
    terms: Vec<(String, Vec<String>)>,
    sink: Option<Sink>,
    history: Vec<(u64, EnergyTotals)>,
}

#[derive(serde::Serialize)]
struct EnergyLine<'a> {
    k: u64,
    energy: &'a EnergyTotals,
}

impl Default for EnergyBudgetHook {
    fn default() -> Self {
        Self::with_terms([
            ("dry_static", vec!["T"]),
            ("latent", vec!["q"]),
            ("kinetic", vec!["u", "v"]),
        ])
    }
}

impl EnergyBudgetHook {
    /// The default three-term budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// A budget over custom terms, each summing the listed fields.
    pub fn with_terms<I, T, F, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = (T, F)>,
        T: Into<String>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|(t, fields)| (t.into(), fields.into_iter().map(Into::into).collect()))
                .collect(),
            sink: None,
            history: Vec::new(),
        }
    }

    /// Also write each step's totals to `sink`.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// `(step index, totals)` for every observed step.
    pub fn history(&self) -> &[(u64, EnergyTotals)] {
        &self.history
    }

    /// Totals of the most recent step.
    pub fn last(&self) -> Option<&EnergyTotals> {
        self.history.last().map(|(_, t)| t)
    }

    fn totals<B: Backend>(&self, backend: &B, state: &State<B::Array>) -> EnergyTotals {
        self.terms
            .iter()
            .map(|(term, fields)| {
                let total: f64 = fields.iter().map(|f| field_total(backend, state, f)).sum();
                (term.clone(), total)
            })
            .collect()
    }
}

impl<B: Backend> Hook<B> for EnergyBudgetHook {
    fn name(&self) -> &str {
        "energy_budget"
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        let totals = self.totals(event.backend, event.state);
        if let Some(sink) = self.sink.as_mut() {
            match sink.format() {
                OutputFormat::Csv => sink.csv_row(
                    std::iter::once(event.index.to_string())
                        .chain(totals.values().map(|v| Num(*v).to_string())),
                )?,
                OutputFormat::Ndjson => sink.json_line(&EnergyLine {
                    k: event.index,
                    energy: &totals,
                })?,
            }
        }
        self.history.push((event.index, totals));
        Ok(())
    }
}

// ── Water ───────────────────────────────────────────────────────

/// Tracks the global total of one moisture field (default `q`).
///
/// CSV lines are `k,total`; NDJSON lines are `{"k":k,"<var>":total}`.
#[derive(Debug)]
pub struct WaterBudgetHook {
    var: String,
    sink: Option<Sink>,
    history: Vec<(u64, f64)>,
}

struct WaterLine<'a> {
    k: u64,
    var: &'a str,
    total: f64,
}

impl Serialize for WaterLine<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("k", &self.k)?;
        map.serialize_entry(self.var, &self.total)?;
        map.end()
    }
}

impl Default for WaterBudgetHook {
    fn default() -> Self {
        Self::new("q")
    }
}

impl WaterBudgetHook {
    /// Track `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            sink: None,
            history: Vec::new(),
        }
    }

    /// Also write each step's total to `sink`.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// `(step index, total)` for every observed step.
    pub fn history(&self) -> &[(u64, f64)] {
        &self.history
    }

    /// Largest absolute change of the total between any two observed steps.
    pub fn max_drift(&self) -> f64 {
        let Some(&(_, first)) = self.history.first() else {
            return 0.0;
        };
        self.history
            .iter()
            .map(|(_, t)| (t - first).abs())
            .fold(0.0, f64::max)
    }
}

impl<B: Backend> Hook<B> for WaterBudgetHook {
    fn name(&self) -> &str {
        "water_budget"
    }

    fn observe(&mut self, event: &StepEvent<'_, B>) -> Result<(), HookError> {
        let total = field_total(event.backend, event.state, &self.var);
        if let Some(sink) = self.sink.as_mut() {
            match sink.format() {
                OutputFormat::Csv => {
                    sink.csv_row([event.index.to_string(), Num(total).to_string()])?
                }
                OutputFormat::Ndjson => sink.json_line(&WaterLine {
                    k: event.index,
                    var: &self.var,
                    total,
                })?,
            }
        }
        self.history.push((event.index, total));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::{Diag, Record};
    use stratus_test_utils::{record, SharedBuffer, VecArray, VecBackend};

    fn observe<H: Hook<VecBackend>>(hook: &mut H, index: u64, state: &State<VecArray>) {
        let params = Record::new();
        let diag = Diag::new();
        let event = StepEvent {
            index,
            state,
            diag: &diag,
            params: &params,
            backend: &VecBackend,
        };
        hook.observe(&event).unwrap();
    }

    #[test]
    fn energy_terms_in_order() {
        let buf = SharedBuffer::new();
        let mut hook = EnergyBudgetHook::new().with_sink(Sink::new(buf.clone(), OutputFormat::Csv));
        let mut state = record(&[("T", &[1.0, 2.0]), ("u", &[0.5]), ("v", &[0.5])]);
        state.insert("q".into(), Value::Float(0.25));
        observe(&mut hook, 0, &state);

        let last = hook.last().unwrap();
        assert_eq!(last.keys().collect::<Vec<_>>(), vec!["dry_static", "latent", "kinetic"]);
        assert_eq!(last["dry_static"], 3.0);
        assert_eq!(last["latent"], 0.25);
        assert_eq!(last["kinetic"], 1.0);
        assert_eq!(buf.lines(), vec!["0,3.0,0.25,1.0"]);
    }

    #[test]
    fn energy_ndjson_keeps_term_order() {
        let buf = SharedBuffer::new();
        let mut hook = EnergyBudgetHook::with_terms([("z_term", vec!["T"]), ("a_term", vec!["q"])])
            .with_sink(Sink::new(buf.clone(), OutputFormat::Ndjson));
        observe(&mut hook, 1, &record(&[("T", &[2.0])]));
        assert_eq!(
            buf.lines(),
            vec![r#"{"k":1,"energy":{"z_term":2.0,"a_term":0.0}}"#]
        );
    }

    #[test]
    fn water_csv_and_ndjson() {
        let buf = SharedBuffer::new();
        let mut hook = WaterBudgetHook::default().with_sink(Sink::new(buf.clone(), OutputFormat::Csv));
        observe(&mut hook, 0, &record(&[("q", &[1.0, 1.5])]));
        observe(&mut hook, 1, &record(&[("q", &[1.0, 1.0])]));
        assert_eq!(buf.lines(), vec!["0,2.5", "1,2.0"]);
        assert_eq!(hook.max_drift(), 0.5);

        let buf = SharedBuffer::new();
        let mut hook = WaterBudgetHook::new("qv").with_sink(Sink::new(buf.clone(), OutputFormat::Ndjson));
        observe(&mut hook, 7, &record(&[("qv", &[3.0])]));
        assert_eq!(buf.lines(), vec![r#"{"k":7,"qv":3.0}"#]);
    }

    #[test]
    fn missing_field_counts_as_zero() {
        let mut hook = WaterBudgetHook::default();
        observe(&mut hook, 0, &Record::new());
        assert_eq!(hook.history(), &[(0, 0.0)]);
    }
}
