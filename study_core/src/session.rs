//! A study session over one unit.
//!
//! Opens a [`StepGate`] seeded from the stored record, and on every accepted
//! completion publishes the new percentage and writes the record back
//! (read, mutate in memory, write). Units without an id are studied in
//! memory only.

use crate::{
    Completion, ProgressAggregator, ProgressRecord, ProgressStore, StepGate, StepId, StepState,
    StudyUnit, TransitionError,
};

pub struct StudySession {
    unit: StudyUnit,
    gate: StepGate,
    aggregator: ProgressAggregator,
    store: ProgressStore,
}

impl StudySession {
    /// Open a session, resuming from any stored progress for the unit
    pub fn open(unit: StudyUnit, store: ProgressStore) -> Self {
        let prior = unit
            .id
            .as_ref()
            .and_then(|id| store.get(id))
            .unwrap_or_default();
        let gate = StepGate::from_record(unit.step_ids(), &prior);

        tracing::debug!(
            "Opened {} session for {:?} at {}/{} steps",
            store.namespace(),
            unit.id,
            gate.completed_count(),
            gate.total()
        );

        Self {
            unit,
            gate,
            aggregator: ProgressAggregator::new(),
            store,
        }
    }

    /// Register a progress observer (e.g. a parent screen)
    pub fn on_progress_update<F>(&mut self, callback: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.aggregator.on_progress_update(callback);
    }

    /// Complete `step`, publish progress and persist
    ///
    /// Rejected transitions leave the gate and the store untouched.
    pub fn complete(&mut self, step: &StepId) -> Result<Completion, TransitionError> {
        let completion = self.gate.complete(step)?;
        self.after_completion();
        Ok(completion)
    }

    /// Complete the currently active step
    pub fn complete_active(&mut self) -> Result<Completion, TransitionError> {
        let completion = self.gate.complete_active()?;
        self.after_completion();
        Ok(completion)
    }

    fn after_completion(&mut self) {
        self.aggregator.publish(&self.gate);
        match self.unit.id {
            Some(ref id) => {
                self.store.save(id, &self.gate.to_record());
            }
            None => tracing::debug!("Unit has no id, progress kept in memory only"),
        }
    }

    pub fn unit(&self) -> &StudyUnit {
        &self.unit
    }

    pub fn gate(&self) -> &StepGate {
        &self.gate
    }

    pub fn percent(&self) -> u8 {
        crate::percent(self.gate.completed_count(), self.gate.total())
    }

    pub fn snapshot(&self) -> Vec<(StepId, StepState)> {
        self.gate.snapshot()
    }

    pub fn record(&self) -> ProgressRecord {
        self.gate.to_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        default_steps, FixedClock, KeyValueStore, MemoryKvStore, UnitId, STUDY_NAMESPACE,
    };
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    fn store() -> ProgressStore {
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
        ProgressStore::new(Arc::new(MemoryKvStore::new()), clock, STUDY_NAMESPACE)
    }

    fn unit(id: Option<&str>) -> StudyUnit {
        StudyUnit {
            id: id.map(UnitId::new),
            title: "Be Still".into(),
            category: "peace".into(),
            steps: default_steps(),
            reference: None,
        }
    }

    fn id(s: &str) -> StepId {
        StepId::from(s)
    }

    #[test]
    fn test_devotional_walkthrough() {
        let store = store();
        let mut session = StudySession::open(unit(Some("1")), store.clone());

        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        session.on_progress_update(move |p| sink.lock().unwrap().push(p));

        session.complete(&id("verse")).unwrap();
        assert_eq!(session.percent(), 17);
        assert!(session.gate().is_unlocked(&id("explanation")));
        assert!(!session.gate().is_unlocked(&id("related")));

        // Skipping ahead is rejected and changes nothing
        let err = session.complete(&id("activity")).unwrap_err();
        assert!(matches!(err, TransitionError::OutOfOrder { .. }));
        assert_eq!(session.percent(), 17);
        assert_eq!(session.gate().completed_count(), 1);
        assert_eq!(*updates.lock().unwrap(), vec![17]);

        let mut completions = 0;
        for step in ["explanation", "related", "knowledge", "activity", "reflection"] {
            if session.complete(&id(step)).unwrap().unit_completed {
                completions += 1;
            }
        }
        assert_eq!(session.percent(), 100);
        assert_eq!(completions, 1);
        assert!(session.complete_active().is_err());
        assert_eq!(*updates.lock().unwrap(), vec![17, 33, 50, 67, 83, 100]);

        let stored = store.get(&UnitId::new("1")).unwrap();
        assert_eq!(stored.completed_steps.len(), 6);
        assert_eq!(stored.current_step, None);
    }

    #[test]
    fn test_resume_from_store() {
        let store = store();
        {
            let mut session = StudySession::open(unit(Some("2")), store.clone());
            session.complete_active().unwrap();
            session.complete_active().unwrap();
        }

        let session = StudySession::open(unit(Some("2")), store.clone());
        assert_eq!(session.gate().active(), Some(&id("related")));
        assert_eq!(session.percent(), 33);
    }

    #[test]
    fn test_rejected_completion_does_not_write() {
        let kv = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
        let store = ProgressStore::new(kv.clone(), clock, STUDY_NAMESPACE);
        let mut session = StudySession::open(unit(Some("3")), store);

        assert!(session.complete(&id("reflection")).is_err());
        assert!(kv.list_keys("").unwrap().is_empty());
    }

    #[test]
    fn test_unit_without_id_stays_in_memory() {
        let store = store();
        let mut session = StudySession::open(unit(None), store.clone());

        session.complete_active().unwrap();
        assert_eq!(session.percent(), 17);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_storage_failure_does_not_block_progress() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set_failing(true);
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
        let store = ProgressStore::new(kv, clock, STUDY_NAMESPACE);

        let mut session = StudySession::open(unit(Some("4")), store);
        session.complete_active().unwrap();
        assert_eq!(session.record().current_step, Some(id("explanation")));
    }
}
