//! Date/time source.
//!
//! The daily cache compares calendar days in local time, so everything that
//! needs "today" or "now" goes through a [`Clock`].

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::Mutex;

/// Source of the current calendar day and timestamp
pub trait Clock: Send + Sync {
    /// Current calendar day in local time
    fn today(&self) -> NaiveDate;

    /// Current instant, used to stamp progress records
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in the machine's local timezone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a given day.
///
/// `now()` pairs the pinned day with the current UTC time of day, so stamps
/// from separate runs on the same pinned day still order by when they
/// happened. Within one clock, stamps are strictly increasing.
#[derive(Debug)]
pub struct FixedClock {
    inner: Mutex<(NaiveDate, Option<DateTime<Utc>>)>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            inner: Mutex::new((today, None)),
        }
    }

    /// Move the pinned day forward (or backward for negative `days`)
    pub fn advance_days(&self, days: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.0 = inner.0 + chrono::Duration::days(days);
        inner.1 = None;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn now(&self) -> DateTime<Utc> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut stamp = inner.0.and_time(Utc::now().time()).and_utc();
        if let Some(last) = inner.1 {
            if stamp <= last {
                stamp = last + chrono::Duration::microseconds(1);
            }
        }
        inner.1 = Some(stamp);
        stamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances_days() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_fixed_clock_timestamps_are_ordered() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let first = clock.now();
        let second = clock.now();
        assert!(second > first);
        assert_eq!(first.date_naive(), clock.today());
    }

    #[test]
    fn test_separate_fixed_clocks_order_by_wall_time() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let earlier = FixedClock::new(day).now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let later = FixedClock::new(day).now();
        assert!(later > earlier);
    }
}
