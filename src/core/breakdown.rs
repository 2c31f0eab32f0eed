//! Audit trail of a calculation run.
//!
//! Calculators return plain result records. Each record describes itself as a breakdown step via
//! [`BreakdownStep`], and the orchestrator's [`StepRecorder`] is the only thing that turns those
//! descriptions into numbered [`CalculationStep`]s.

use super::income::ReturnId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

/// A named value captured in a step's inputs snapshot
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum InputValue {
    Amount(#[schemars(with = "f64")] Decimal),
    Flag(bool),
    Date(NaiveDate),
    Text(String),
}

impl std::fmt::Display for InputValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputValue::Amount(d) => write!(f, "{}", d),
            InputValue::Flag(b) => write!(f, "{}", b),
            InputValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            InputValue::Text(s) => f.write_str(s),
        }
    }
}

/// Inputs snapshot, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct StepInputs(BTreeMap<String, InputValue>);

impl StepInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(mut self, name: &str, value: Decimal) -> Self {
        self.0.insert(name.to_string(), InputValue::Amount(value));
        self
    }

    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.0.insert(name.to_string(), InputValue::Flag(value));
        self
    }

    pub fn date(mut self, name: &str, value: Option<NaiveDate>) -> Self {
        if let Some(d) = value {
            self.0.insert(name.to_string(), InputValue::Date(d));
        }
        self
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), InputValue::Text(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InputValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A calculator result that can be recorded in the audit trail
pub trait BreakdownStep {
    /// Stable identifier naming the calculator
    fn step_key(&self) -> &'static str;
    fn inputs(&self) -> StepInputs;
    /// The single headline figure of the step
    fn result(&self) -> Decimal;
    fn explanation(&self) -> String;
}

/// One recorded step of a calculation run
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CalculationStep {
    pub tax_return_id: ReturnId,
    /// Calculation run this step belongs to, starting at 1 per return
    pub run: u32,
    /// Position within the run, contiguous from 1
    pub sequence: u32,
    pub step_key: String,
    pub inputs: StepInputs,
    #[schemars(with = "f64")]
    pub result: Decimal,
    pub explanation: String,
}

/// Collects the steps of one run in memory until the orchestrator commits them
#[derive(Debug)]
pub struct StepRecorder {
    tax_return_id: ReturnId,
    run: u32,
    steps: Vec<CalculationStep>,
}

impl StepRecorder {
    pub fn new(tax_return_id: ReturnId, run: u32) -> Self {
        StepRecorder {
            tax_return_id,
            run,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: &dyn BreakdownStep) {
        let sequence = self.steps.len() as u32 + 1;
        let recorded = CalculationStep {
            tax_return_id: self.tax_return_id.clone(),
            run: self.run,
            sequence,
            step_key: step.step_key().to_string(),
            inputs: step.inputs(),
            result: step.result(),
            explanation: step.explanation(),
        };
        log::debug!(
            "[{} run {}] #{} {} = {}",
            self.tax_return_id,
            self.run,
            sequence,
            recorded.step_key,
            recorded.result
        );
        self.steps.push(recorded);
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn steps(&self) -> &[CalculationStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<CalculationStep> {
        self.steps
    }
}

/// Keep the latest step per key, returned in sequence order of the latest run that produced it.
pub fn latest_per_key(steps: &[CalculationStep]) -> Vec<CalculationStep> {
    let mut latest: BTreeMap<&str, &CalculationStep> = BTreeMap::new();
    for step in steps {
        match latest.get(step.step_key.as_str()) {
            Some(existing) if (existing.run, existing.sequence) > (step.run, step.sequence) => {}
            _ => {
                latest.insert(step.step_key.as_str(), step);
            }
        }
    }
    let mut out: Vec<CalculationStep> = latest.into_values().cloned().collect();
    out.sort_by_key(|s| (s.run, s.sequence));
    out
}
