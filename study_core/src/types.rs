//! Core domain types for the Devo study system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Study units and their ordered steps
//! - Progress records persisted per unit
//! - The dated cache entry for the daily challenge

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a study unit.
///
/// Content APIs hand out both numeric and string ids; both deserialize into
/// the same string form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawUnitId", into = "String")]
pub struct UnitId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUnitId {
    Int(i64),
    Str(String),
}

impl From<RawUnitId> for UnitId {
    fn from(raw: RawUnitId) -> Self {
        match raw {
            RawUnitId::Int(n) => UnitId(n.to_string()),
            RawUnitId::Str(s) => UnitId(s),
        }
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.0
    }
}

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a step, unique within its study unit
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Study Units
// ============================================================================

/// Step ids of the standard devotional flow, in order
pub const DEFAULT_STEP_IDS: [&str; 6] = [
    "verse",
    "explanation",
    "related",
    "knowledge",
    "activity",
    "reflection",
];

/// One stage of a study unit's sequential flow
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub id: StepId,
    #[serde(default)]
    pub title: String,
}

impl Step {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: StepId::from(id),
            title: title.to_string(),
        }
    }
}

/// The six-step devotional flow used when a unit carries no step list
pub fn default_steps() -> Vec<Step> {
    vec![
        Step::new("verse", "Verse"),
        Step::new("explanation", "Explanation"),
        Step::new("related", "Related Verses"),
        Step::new("knowledge", "Knowledge Check"),
        Step::new("activity", "Activity"),
        Step::new("reflection", "Reflection"),
    ]
}

/// A single piece of study content with an ordered list of steps.
///
/// `id` is absent only for the fallback unit served when content cannot be
/// fetched; such a unit is never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StudyUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UnitId>,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_steps")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl StudyUnit {
    /// Step ids in sequence order
    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }
}

// ============================================================================
// Persistence Types
// ============================================================================

/// Durable record of a unit's completed steps.
///
/// `current_step` is the first not-yet-completed step, or `None` once every
/// step is done. `completed_steps` only ever grows.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default)]
    pub completed_steps: BTreeSet<StepId>,
    #[serde(default)]
    pub current_step: Option<StepId>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// The unit selected for "today", stamped with the day it was selected.
///
/// Serialized as the unit's own fields plus `dateStamp`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChallengeCacheEntry {
    #[serde(flatten)]
    pub unit: StudyUnit,
    #[serde(rename = "dateStamp")]
    pub date_stamp: NaiveDate,
}

impl ChallengeCacheEntry {
    /// Only valid for reads on the same calendar day as the stamp
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        self.date_stamp == today
    }
}
