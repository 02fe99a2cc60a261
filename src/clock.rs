//! Clock

use jiff::{Timestamp, civil::DateTime, tz::TimeZone};
use mockall::automock;

/// Source of "now" in venue-local wall-clock time.
#[automock]
pub trait Clock: Send + Sync {
    /// The current venue-local date and time.
    fn now(&self) -> DateTime;

    /// The current instant.
    fn timestamp(&self) -> Timestamp;
}

/// Clock reading the system time in the venue's time zone.
#[derive(Debug, Clone)]
pub struct SystemClock {
    time_zone: TimeZone,
}

impl SystemClock {
    /// Create a clock for the given venue time zone.
    #[must_use]
    pub fn new(time_zone: TimeZone) -> Self {
        Self { time_zone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        Timestamp::now().to_zoned(self.time_zone.clone()).datetime()
    }

    fn timestamp(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock frozen at a fixed venue-local time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime,
}

impl FixedClock {
    /// Create a clock that always reports `now`.
    #[must_use]
    pub const fn new(now: DateTime) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime {
        self.now
    }

    fn timestamp(&self) -> Timestamp {
        self.now
            .to_zoned(TimeZone::UTC)
            .map_or(Timestamp::UNIX_EPOCH, |zoned| zoned.timestamp())
    }
}
