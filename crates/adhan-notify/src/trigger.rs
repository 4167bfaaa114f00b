//! Trigger instant arithmetic.

use chrono::{DateTime, Days, FixedOffset, Local, NaiveTime, TimeZone};

/// Source of "now" for the scheduler.
pub trait Clock: Send + Sync {
    /// Current local wall-clock time with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Next instant at which the wall clock reads `at`, relative to `now`.
///
/// Today's occurrence is used unless it is already in the past, in which
/// case the same wall-clock time one calendar day later is returned. An
/// occurrence exactly equal to `now` is kept. Returns `None` when the local
/// time does not exist in `now`'s time zone.
pub fn next_trigger<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive().and_time(at);
    let candidate = tz.from_local_datetime(&today).earliest()?;

    if candidate < *now {
        let tomorrow = today.checked_add_days(Days::new(1))?;
        tz.from_local_datetime(&tomorrow).earliest()
    } else {
        Some(candidate)
    }
}
