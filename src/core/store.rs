//! Persistence seam for liability snapshots and their breakdown steps.

use super::breakdown::{latest_per_key, CalculationStep};
use super::error::CalculationError;
use super::income::ReturnId;
use super::liability::Liability;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Where liability snapshots and the append-only breakdown live.
///
/// `commit` is the only write: a run's steps and its liability land together or not at all.
pub trait LiabilityStore: Send + Sync {
    fn liability(&self, id: &ReturnId) -> Option<Liability>;

    /// Every recorded step for the return, ordered by run then sequence
    fn steps(&self, id: &ReturnId) -> Vec<CalculationStep>;

    /// The authoritative step per key for reporting
    fn latest_steps(&self, id: &ReturnId) -> Vec<CalculationStep> {
        latest_per_key(&self.steps(id))
    }

    /// Highest committed run for the return, 0 if never calculated
    fn last_run(&self, id: &ReturnId) -> u32;

    fn commit(
        &self,
        id: &ReturnId,
        run: u32,
        steps: Vec<CalculationStep>,
        liability: Liability,
    ) -> Result<(), CalculationError>;
}

#[derive(Debug, Default)]
struct ReturnRecord {
    liability: Option<Liability>,
    steps: Vec<CalculationStep>,
    last_run: u32,
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ReturnId, ReturnRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LiabilityStore for MemoryStore {
    fn liability(&self, id: &ReturnId) -> Option<Liability> {
        self.records.read().get(id).and_then(|r| r.liability.clone())
    }

    fn steps(&self, id: &ReturnId) -> Vec<CalculationStep> {
        self.records
            .read()
            .get(id)
            .map(|r| r.steps.clone())
            .unwrap_or_default()
    }

    fn last_run(&self, id: &ReturnId) -> u32 {
        self.records.read().get(id).map_or(0, |r| r.last_run)
    }

    fn commit(
        &self,
        id: &ReturnId,
        run: u32,
        steps: Vec<CalculationStep>,
        liability: Liability,
    ) -> Result<(), CalculationError> {
        let mut records = self.records.write();
        let record = records.entry(id.clone()).or_default();

        if run <= record.last_run {
            return Err(CalculationError::Store(format!(
                "run {} for {} is not after committed run {}",
                run, id, record.last_run
            )));
        }
        let contiguous = steps
            .iter()
            .enumerate()
            .all(|(i, s)| s.run == run && s.sequence as usize == i + 1 && &s.tax_return_id == id);
        if !contiguous {
            return Err(CalculationError::Store(format!(
                "steps for {} run {} are not a contiguous sequence from 1",
                id, run
            )));
        }

        log::info!("Committed run {} for {} ({} steps)", run, id, steps.len());
        record.steps.extend(steps);
        record.liability = Some(liability);
        record.last_run = run;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::breakdown::StepInputs;
    use crate::core::liability::LiabilityFigures;
    use crate::core::rates::TaxYear;
    use rust_decimal_macros::dec;

    fn id() -> ReturnId {
        ReturnId("r-1".to_string())
    }

    fn step(run: u32, sequence: u32, key: &str) -> CalculationStep {
        CalculationStep {
            tax_return_id: id(),
            run,
            sequence,
            step_key: key.to_string(),
            inputs: StepInputs::new(),
            result: dec!(1),
            explanation: String::new(),
        }
    }

    fn liability(run: u32) -> Liability {
        Liability::new(id(), TaxYear(2025), run, String::new(), LiabilityFigures::default())
    }

    #[test]
    fn empty_store() {
        let store = MemoryStore::new();
        assert!(store.liability(&id()).is_none());
        assert!(store.steps(&id()).is_empty());
        assert_eq!(store.last_run(&id()), 0);
    }

    #[test]
    fn commit_appends_steps_and_replaces_liability() {
        let store = MemoryStore::new();
        store
            .commit(&id(), 1, vec![step(1, 1, "a"), step(1, 2, "b")], liability(1))
            .unwrap();
        store
            .commit(&id(), 2, vec![step(2, 1, "a")], liability(2))
            .unwrap();

        assert_eq!(store.steps(&id()).len(), 3);
        assert_eq!(store.last_run(&id()), 2);
        assert_eq!(store.liability(&id()).unwrap().run, 2);

        let latest = store.latest_steps(&id());
        assert_eq!(latest.len(), 2);
        assert_eq!((latest[0].run, latest[0].step_key.as_str()), (1, "b"));
        assert_eq!((latest[1].run, latest[1].step_key.as_str()), (2, "a"));
    }

    #[test]
    fn stale_run_rejected() {
        let store = MemoryStore::new();
        store.commit(&id(), 1, vec![step(1, 1, "a")], liability(1)).unwrap();
        let err = store.commit(&id(), 1, vec![step(1, 1, "a")], liability(1));
        assert!(matches!(err, Err(CalculationError::Store(_))));
        assert_eq!(store.steps(&id()).len(), 1);
    }

    #[test]
    fn gapped_sequence_rejected() {
        let store = MemoryStore::new();
        let err = store.commit(&id(), 1, vec![step(1, 1, "a"), step(1, 3, "b")], liability(1));
        assert!(err.is_err());
        assert!(store.liability(&id()).is_none());
    }
}
