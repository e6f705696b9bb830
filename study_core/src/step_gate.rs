//! Sequential unlocking of a study unit's steps.
//!
//! Gating rules:
//! - The first step is always unlocked
//! - Step `i > 0` is unlocked iff step `i - 1` is completed
//! - Only the active step (first not-yet-completed) can be completed
//! - Completed steps never revert
//!
//! Finishing the last step reports `unit_completed` on that one
//! [`Completion`]. Every later call is rejected, so the event cannot fire
//! twice for the same gate.

use crate::{ProgressRecord, StepId};
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-step gate state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Locked,
    Unlocked,
    Completed,
}

/// Why a completion request was rejected. State is untouched in every case.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("unknown step '{0}'")]
    UnknownStep(StepId),

    #[error("step '{0}' is already completed")]
    AlreadyCompleted(StepId),

    #[error("step '{step}' is not the active step; complete '{active}' first")]
    OutOfOrder { step: StepId, active: StepId },

    #[error("unit has no steps to complete")]
    NoActiveStep,
}

/// Result of a successful completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub step: StepId,
    /// Newly active step, `None` once the unit is finished
    pub next: Option<StepId>,
    /// True only on the call that finished the last step
    pub unit_completed: bool,
}

/// Completion state machine over one unit's ordered steps
#[derive(Clone, Debug)]
pub struct StepGate {
    steps: Vec<StepId>,
    completed: BTreeSet<StepId>,
    active: Option<usize>,
    completion_emitted: bool,
}

impl StepGate {
    /// Build a gate from the unit's step list and previously completed steps
    ///
    /// Unknown ids in `prior_completed` are dropped. A gate seeded with every
    /// step already completed starts finished and never emits the completion
    /// event.
    pub fn initialize<'a, I>(steps: Vec<StepId>, prior_completed: I) -> Self
    where
        I: IntoIterator<Item = &'a StepId>,
    {
        let mut completed = BTreeSet::new();
        for id in prior_completed {
            if steps.contains(id) {
                completed.insert(id.clone());
            } else {
                tracing::warn!("Ignoring completed step '{}' not present in unit", id);
            }
        }

        let active = steps.iter().position(|s| !completed.contains(s));
        let completion_emitted = active.is_none();

        if completion_emitted {
            tracing::debug!("Gate initialized with all {} steps complete", steps.len());
        }

        Self {
            steps,
            completed,
            active,
            completion_emitted,
        }
    }

    /// Seed a gate from a stored record
    pub fn from_record(steps: Vec<StepId>, record: &ProgressRecord) -> Self {
        Self::initialize(steps, &record.completed_steps)
    }

    /// Complete the active step
    pub fn complete(&mut self, step: &StepId) -> Result<Completion, TransitionError> {
        let index = self
            .position(step)
            .ok_or_else(|| TransitionError::UnknownStep(step.clone()))?;

        if self.completed.contains(step) {
            return Err(TransitionError::AlreadyCompleted(step.clone()));
        }

        // Any known, uncompleted step implies an active step exists
        let active = match self.active {
            Some(active) => active,
            None => return Err(TransitionError::AlreadyCompleted(step.clone())),
        };

        if index != active {
            return Err(TransitionError::OutOfOrder {
                step: step.clone(),
                active: self.steps[active].clone(),
            });
        }

        self.completed.insert(step.clone());
        self.active = self.steps[index + 1..]
            .iter()
            .position(|s| !self.completed.contains(s))
            .map(|offset| index + 1 + offset);

        let unit_completed = self.active.is_none() && !self.completion_emitted;
        if unit_completed {
            self.completion_emitted = true;
            tracing::info!("All {} steps completed", self.steps.len());
        }

        let next = self.active().cloned();
        tracing::debug!("Completed step '{}', next: {:?}", step, next);

        Ok(Completion {
            step: step.clone(),
            next,
            unit_completed,
        })
    }

    /// Complete whatever step is currently active
    pub fn complete_active(&mut self) -> Result<Completion, TransitionError> {
        match self.active().cloned() {
            Some(step) => self.complete(&step),
            None => match self.steps.last() {
                Some(last) => Err(TransitionError::AlreadyCompleted(last.clone())),
                None => Err(TransitionError::NoActiveStep),
            },
        }
    }

    pub fn state(&self, step: &StepId) -> Option<StepState> {
        let index = self.position(step)?;
        Some(if self.completed.contains(step) {
            StepState::Completed
        } else if index == 0 || self.completed.contains(&self.steps[index - 1]) {
            StepState::Unlocked
        } else {
            StepState::Locked
        })
    }

    pub fn is_unlocked(&self, step: &StepId) -> bool {
        matches!(
            self.state(step),
            Some(StepState::Unlocked | StepState::Completed)
        )
    }

    pub fn is_completed(&self, step: &StepId) -> bool {
        self.completed.contains(step)
    }

    /// First unlocked-but-not-completed step
    pub fn active(&self) -> Option<&StepId> {
        self.active.map(|i| &self.steps[i])
    }

    pub fn is_complete(&self) -> bool {
        self.active.is_none()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    /// Every step with its current state, in sequence order
    pub fn snapshot(&self) -> Vec<(StepId, StepState)> {
        self.steps
            .iter()
            .filter_map(|s| self.state(s).map(|state| (s.clone(), state)))
            .collect()
    }

    /// Persistable view of the gate (timestamp is set by the store)
    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            completed_steps: self.completed.clone(),
            current_step: self.active().cloned(),
            last_updated: None,
        }
    }

    fn position(&self, step: &StepId) -> Option<usize> {
        self.steps.iter().position(|s| s == step)
    }
}
