//! Source of time for daily rotation and comment timestamps.
//!
//! The rotation boundary is the UTC calendar date.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to an instant, moved by hand. Used in tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Pinned to midnight UTC of `date`
    pub fn new(date: NaiveDate) -> Self {
        Self {
            now: Mutex::new(date.and_time(chrono::NaiveTime::MIN).and_utc()),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        self.set_now(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        let mut current = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *current = now;
    }

    /// Move forward by whole days
    pub fn advance_days(&self, days: u64) {
        let mut current = self.now.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = current.checked_add_days(chrono::Days::new(days)) {
            *current = next;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        clock.set(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn test_fixed_clock_now_follows_date() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(clock.now().to_rfc3339(), "2025-06-01T00:00:00+00:00");

        let late = "2025-06-01T23:59:30Z".parse::<DateTime<Utc>>().unwrap();
        clock.set_now(late);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }
}
