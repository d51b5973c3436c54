//! Timestamp type and clock abstraction.
//!
//! Timestamps are Unix epoch seconds (UTC). Election windows, vote events and
//! retry schedules are all expressed in this unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Seconds remaining until this timestamp (zero once passed).
    pub fn remaining_from(&self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0)
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Whether `now` has reached or passed this timestamp.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now.0 >= self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the current time.
///
/// Production code uses [`SystemClock`]; tests swap in a controllable clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_passed_is_inclusive() {
        let end = Timestamp::new(100);
        assert!(!end.has_passed(Timestamp::new(99)));
        assert!(end.has_passed(Timestamp::new(100)));
        assert!(end.has_passed(Timestamp::new(101)));
    }

    #[test]
    fn remaining_saturates() {
        let end = Timestamp::new(100);
        assert_eq!(end.remaining_from(Timestamp::new(40)), 60);
        assert_eq!(end.remaining_from(Timestamp::new(400)), 0);
    }
}
