//! Namespaced persistence of progress records.
//!
//! Records live under `<namespace>:<unitId>` in the key-value store. Storage
//! failures never reach the caller: reads degrade to "absent" and writes to
//! a logged no-op, so losing progress can never take the UI down with it.

use crate::{Clock, KeyValueStore, ProgressRecord, UnitId};
use std::sync::Arc;

/// Namespace of per-unit study history
pub const STUDY_NAMESPACE: &str = "studyProgress";

/// Namespace of the daily challenge's progress bookkeeping
pub const CHALLENGE_NAMESPACE: &str = "challengeProgress";

/// Durable `UnitId -> ProgressRecord` map within one namespace
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    namespace: String,
}

impl ProgressStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, namespace: &str) -> Self {
        Self {
            kv,
            clock,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, unit_id: &UnitId) -> String {
        format!("{}:{}", self.namespace, unit_id)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Stamp `record` with the current time and overwrite any prior record
    ///
    /// Returns the record as written, or `None` if storage failed.
    pub fn save(&self, unit_id: &UnitId, record: &ProgressRecord) -> Option<ProgressRecord> {
        let stamped = ProgressRecord {
            last_updated: Some(self.clock.now()),
            ..record.clone()
        };

        let json = match serde_json::to_string(&stamped) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize progress for {}: {}", unit_id, e);
                return None;
            }
        };

        match self.kv.set(&self.key(unit_id), &json) {
            Ok(()) => {
                tracing::debug!(
                    "Saved {} progress for {} ({} steps)",
                    self.namespace,
                    unit_id,
                    stamped.completed_steps.len()
                );
                Some(stamped)
            }
            Err(e) => {
                tracing::warn!("Failed to save progress for {}: {}", unit_id, e);
                None
            }
        }
    }

    /// Stored record for `unit_id`, or `None` when absent or unreadable
    pub fn get(&self, unit_id: &UnitId) -> Option<ProgressRecord> {
        let raw = match self.kv.get(&self.key(unit_id)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read progress for {}: {}", unit_id, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Failed to parse progress for {}: {}", unit_id, e);
                None
            }
        }
    }

    /// Every record in the namespace, keyed by the unit id from its key
    ///
    /// Unparseable records are skipped.
    pub fn get_all(&self) -> Vec<(UnitId, ProgressRecord)> {
        let prefix = self.prefix();
        let keys = match self.kv.list_keys(&prefix) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list {} records: {}", self.namespace, e);
                return Vec::new();
            }
        };

        keys.iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(UnitId::from)
            .filter_map(|id| self.get(&id).map(|record| (id, record)))
            .collect()
    }

    /// Records ordered by most recently updated, at most `limit` of them
    pub fn recently_engaged(&self, limit: usize) -> Vec<(UnitId, ProgressRecord)> {
        let mut records = self.get_all();
        records.sort_by(|a, b| b.1.last_updated.cmp(&a.1.last_updated));
        records.truncate(limit);
        records
    }

    /// Remove the record for `unit_id`
    pub fn clear(&self, unit_id: &UnitId) {
        match self.kv.remove(&self.key(unit_id)) {
            Ok(()) => tracing::debug!("Cleared {} progress for {}", self.namespace, unit_id),
            Err(e) => tracing::warn!("Failed to clear progress for {}: {}", unit_id, e),
        }
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
