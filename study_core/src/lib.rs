#![forbid(unsafe_code)]

//! Core domain model and business logic for the Devo study companion.
//!
//! This crate provides:
//! - Domain types (study units, steps, progress records, cache entries)
//! - Step gating and progress aggregation
//! - Persistence (key-value store, progress store)
//! - The once-per-day challenge cache
//! - Content catalog and clock collaborators

pub mod types;
pub mod error;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod logging;
pub mod kv;
pub mod step_gate;
pub mod aggregator;
pub mod progress_store;
pub mod daily_cache;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, ContentSource, UnitFilter};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use step_gate::{Completion, StepGate, StepState, TransitionError};
pub use aggregator::{percent, ProgressAggregator};
pub use progress_store::{ProgressStore, CHALLENGE_NAMESPACE, STUDY_NAMESPACE};
pub use daily_cache::{DailyContentCache, TodaysUnit, CHALLENGE_CACHE_KEY};
pub use session::StudySession;
