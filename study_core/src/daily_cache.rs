//! Once-per-calendar-day selection of the daily challenge unit.
//!
//! ## Selection Logic
//!
//! 1. A cached entry stamped with today's date is returned as-is
//! 2. Otherwise a random unit is fetched and cached with today's stamp,
//!    and the challenge progress of the previous unit is cleared
//! 3. If the fetch fails, a fallback unit is returned and nothing is
//!    cached, so the next read retries
//!
//! Days are compared as local calendar dates, not a rolling 24h window.
//! Per-unit study history (`studyProgress`) is never touched here.

use crate::{
    ChallengeCacheEntry, Clock, ContentSource, KeyValueStore, ProgressStore, StudyUnit,
    CHALLENGE_NAMESPACE,
};
use std::sync::Arc;

/// Storage key of the cached daily entry
pub const CHALLENGE_CACHE_KEY: &str = "dailyChallenge:current";

/// Title of the unit served when no content could be fetched
pub const DEFAULT_FALLBACK_TITLE: &str = "Daily Challenge";

/// Today's unit and where it came from
#[derive(Clone, Debug, PartialEq)]
pub enum TodaysUnit {
    /// Served from today's cache entry
    Cached(StudyUnit),
    /// Fetched and cached on this read
    Fetched(StudyUnit),
    /// Fetch failed; not cached
    Fallback(StudyUnit),
}

impl TodaysUnit {
    pub fn unit(&self) -> &StudyUnit {
        match self {
            TodaysUnit::Cached(u) | TodaysUnit::Fetched(u) | TodaysUnit::Fallback(u) => u,
        }
    }

    pub fn into_unit(self) -> StudyUnit {
        match self {
            TodaysUnit::Cached(u) | TodaysUnit::Fetched(u) | TodaysUnit::Fallback(u) => u,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TodaysUnit::Fallback(_))
    }

    pub fn source(&self) -> &'static str {
        match self {
            TodaysUnit::Cached(_) => "cached",
            TodaysUnit::Fetched(_) => "fetched",
            TodaysUnit::Fallback(_) => "fallback",
        }
    }
}

/// Day-bounded cache in front of a [`ContentSource`]
pub struct DailyContentCache {
    kv: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentSource>,
    clock: Arc<dyn Clock>,
    challenge_progress: ProgressStore,
    fallback_title: String,
}

impl DailyContentCache {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        content: Arc<dyn ContentSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let challenge_progress =
            ProgressStore::new(Arc::clone(&kv), Arc::clone(&clock), CHALLENGE_NAMESPACE);
        Self {
            kv,
            content,
            clock,
            challenge_progress,
            fallback_title: DEFAULT_FALLBACK_TITLE.to_string(),
        }
    }

    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = title.into();
        self
    }

    /// Progress store for the daily slot's bookkeeping
    pub fn challenge_progress(&self) -> &ProgressStore {
        &self.challenge_progress
    }

    /// The stored entry regardless of its date stamp
    pub fn cached_entry(&self) -> Option<ChallengeCacheEntry> {
        let raw = match self.kv.get(CHALLENGE_CACHE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read daily challenge cache: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Discarding unreadable daily challenge cache: {}", e);
                None
            }
        }
    }

    /// Today's unit, fetching at most once per calendar day
    pub fn get_todays_unit(&self) -> TodaysUnit {
        let today = self.clock.today();
        let previous = self.cached_entry();

        if let Some(ref entry) = previous {
            if entry.is_valid_on(today) {
                tracing::debug!("Daily challenge cache hit for {}", today);
                return TodaysUnit::Cached(entry.unit.clone());
            }
            tracing::info!(
                "Daily challenge from {} is stale on {}, refetching",
                entry.date_stamp,
                today
            );
        }

        let unit = match self.content.fetch_random_unit() {
            Ok(unit) => unit,
            Err(e) => {
                tracing::warn!("Failed to fetch daily challenge: {}. Using fallback.", e);
                return TodaysUnit::Fallback(self.fallback_unit());
            }
        };

        let entry = ChallengeCacheEntry {
            unit,
            date_stamp: today,
        };
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = self.kv.set(CHALLENGE_CACHE_KEY, &json) {
                    tracing::warn!("Failed to cache daily challenge: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize daily challenge: {}", e),
        }

        if let Some(previous_id) = previous.and_then(|p| p.unit.id) {
            self.challenge_progress.clear(&previous_id);
        }

        tracing::info!("Selected daily challenge {:?} for {}", entry.unit.id, today);
        TodaysUnit::Fetched(entry.unit)
    }

    fn fallback_unit(&self) -> StudyUnit {
        StudyUnit {
            id: None,
            title: self.fallback_title.clone(),
            category: String::new(),
            steps: crate::default_steps(),
            reference: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error, FixedClock, MemoryKvStore, ProgressRecord, Result, StepId, UnitFilter, UnitId,
        STUDY_NAMESPACE,
    };
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Hands out units "u1", "u2", ... in order
    #[derive(Default)]
    struct SequenceSource {
        fetches: AtomicUsize,
        failing: AtomicBool,
    }

    impl ContentSource for SequenceSource {
        fn fetch_unit_by_id(&self, id: &UnitId) -> Result<StudyUnit> {
            Err(Error::NotFound(id.to_string()))
        }

        fn fetch_random_unit(&self) -> Result<StudyUnit> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Content("offline".into()));
            }
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StudyUnit {
                id: Some(UnitId::new(format!("u{}", n))),
                title: format!("Unit {}", n),
                category: "test".into(),
                steps: crate::default_steps(),
                reference: None,
            })
        }

        fn fetch_unit_list(&self, _filter: Option<&UnitFilter>) -> Result<Vec<StudyUnit>> {
            Ok(vec![])
        }
    }

    struct Fixture {
        kv: Arc<MemoryKvStore>,
        source: Arc<SequenceSource>,
        clock: Arc<FixedClock>,
        cache: DailyContentCache,
    }

    fn day_d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(MemoryKvStore::new());
        let source = Arc::new(SequenceSource::default());
        let clock = Arc::new(FixedClock::new(day_d()));
        let cache = DailyContentCache::new(kv.clone(), source.clone(), clock.clone());
        Fixture {
            kv,
            source,
            clock,
            cache,
        }
    }

    fn fetches(f: &Fixture) -> usize {
        f.source.fetches.load(Ordering::SeqCst)
    }

    #[test]
    fn test_same_day_reads_fetch_once() {
        let f = fixture();

        let first = f.cache.get_todays_unit();
        let second = f.cache.get_todays_unit();

        assert!(matches!(first, TodaysUnit::Fetched(_)));
        assert!(matches!(second, TodaysUnit::Cached(_)));
        assert_eq!(first.unit().id, second.unit().id);
        assert_eq!(fetches(&f), 1);
    }

    #[test]
    fn test_new_day_refetches() {
        let f = fixture();

        let first = f.cache.get_todays_unit().into_unit();
        assert_eq!(f.cache.cached_entry().unwrap().date_stamp, day_d());

        f.clock.advance_days(1);
        let second = f.cache.get_todays_unit();

        assert!(matches!(second, TodaysUnit::Fetched(_)));
        assert_eq!(fetches(&f), 2);
        assert_ne!(first.id, second.unit().id);

        let entry = f.cache.cached_entry().unwrap();
        assert_eq!(entry.date_stamp, day_d().succ_opt().unwrap());
        assert_eq!(entry.unit.id, Some(UnitId::new("u2")));
    }

    #[test]
    fn test_earlier_day_is_also_a_miss() {
        let f = fixture();
        f.cache.get_todays_unit();

        f.clock.advance_days(-1);
        assert!(matches!(f.cache.get_todays_unit(), TodaysUnit::Fetched(_)));
        assert_eq!(fetches(&f), 2);
    }

    #[test]
    fn test_rotation_clears_only_challenge_progress() {
        let f = fixture();
        let first_id = f.cache.get_todays_unit().into_unit().id.unwrap();

        let record = ProgressRecord {
            completed_steps: [StepId::from("verse")].into_iter().collect(),
            current_step: Some(StepId::from("explanation")),
            last_updated: None,
        };
        let study = ProgressStore::new(f.kv.clone(), f.clock.clone(), STUDY_NAMESPACE);
        study.save(&first_id, &record);
        f.cache.challenge_progress().save(&first_id, &record);

        // Same day: nothing cleared
        f.cache.get_todays_unit();
        assert!(f.cache.challenge_progress().get(&first_id).is_some());

        f.clock.advance_days(1);
        f.cache.get_todays_unit();

        assert!(f.cache.challenge_progress().get(&first_id).is_none());
        assert!(study.get(&first_id).is_some());
    }

    #[test]
    fn test_fetch_failure_returns_uncached_fallback() {
        crate::logging::init_test();
        let f = fixture();
        f.source.failing.store(true, Ordering::SeqCst);

        let today = f.cache.get_todays_unit();
        assert!(today.is_fallback());
        assert_eq!(today.unit().id, None);
        assert_eq!(today.unit().title, DEFAULT_FALLBACK_TITLE);
        assert!(f.cache.cached_entry().is_none());

        // Next read retries the fetch
        f.source.failing.store(false, Ordering::SeqCst);
        assert!(matches!(f.cache.get_todays_unit(), TodaysUnit::Fetched(_)));
    }

    #[test]
    fn test_fetch_failure_keeps_stale_entry_and_progress() {
        let f = fixture();
        let first_id = f.cache.get_todays_unit().into_unit().id.unwrap();
        f.cache
            .challenge_progress()
            .save(&first_id, &ProgressRecord::default());

        f.clock.advance_days(1);
        f.source.failing.store(true, Ordering::SeqCst);
        assert!(f.cache.get_todays_unit().is_fallback());

        assert_eq!(f.cache.cached_entry().unwrap().date_stamp, day_d());
        assert!(f.cache.challenge_progress().get(&first_id).is_some());
    }

    #[test]
    fn test_custom_fallback_title() {
        let f = fixture();
        f.source.failing.store(true, Ordering::SeqCst);
        let cache = DailyContentCache::new(f.kv.clone(), f.source.clone(), f.clock.clone())
            .with_fallback_title("Verse of the Day");

        assert_eq!(cache.get_todays_unit().unit().title, "Verse of the Day");
    }

    #[test]
    fn test_storage_failure_still_serves_content() {
        let f = fixture();
        f.kv.set_failing(true);

        assert!(matches!(f.cache.get_todays_unit(), TodaysUnit::Fetched(_)));
        assert!(matches!(f.cache.get_todays_unit(), TodaysUnit::Fetched(_)));
        assert_eq!(fetches(&f), 2);
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let f = fixture();
        f.kv.set(CHALLENGE_CACHE_KEY, "garbage").unwrap();

        assert!(matches!(f.cache.get_todays_unit(), TodaysUnit::Fetched(_)));
        assert_eq!(fetches(&f), 1);
    }
}
