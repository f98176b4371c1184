//! Wall-clock source.
//!
//! Daily records are keyed by dates in the hotel's local timezone, so "today"
//! depends on the configured UTC offset. A trait keeps time injectable for
//! deterministic tests.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Monotonic wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The current date at the hotel's local midnight, given its UTC offset
    /// in minutes.
    fn today_local(&self, utc_offset_minutes: i32) -> NaiveDate {
        (self.now() + Duration::minutes(i64::from(utc_offset_minutes))).date_naive()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
