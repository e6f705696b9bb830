//! Completion percentage and progress observers.

use crate::StepGate;

/// Rounded completion percentage in `[0, 100]`
///
/// Zero total steps counts as fully complete.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total);
    // round(100 * c / t), half rounds up
    ((200 * completed + total) / (2 * total)) as u8
}

type Observer = Box<dyn FnMut(u8) + Send>;

/// Projects a gate's state to a percentage and notifies registered observers
#[derive(Default)]
pub struct ProgressAggregator {
    observers: Vec<Observer>,
    last: Option<u8>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked with every published percentage
    pub fn on_progress_update<F>(&mut self, callback: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    /// Compute the gate's percentage and notify every observer
    pub fn publish(&mut self, gate: &StepGate) -> u8 {
        let value = percent(gate.completed_count(), gate.total());
        if let Some(last) = self.last {
            if value < last {
                tracing::warn!("Progress went backwards: {}% -> {}%", last, value);
            }
        }
        self.last = Some(value);

        for observer in &mut self.observers {
            observer(value);
        }
        tracing::debug!("Published progress {}% to {} observers", value, self.observers.len());
        value
    }

    /// Last published percentage, if any
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

impl std::fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("observers", &self.observers.len())
            .field("last", &self.last)
            .finish()
    }
}
