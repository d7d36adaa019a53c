//! Time source for token issuance and verification.
//!
//! All instants are UTC with whole-second precision, which is the precision
//! tokens are stored and compared at.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// Clock that only moves when told to. Shared between the service and the
/// code driving it, so time can be advanced across a token's lifetime.
#[derive(Debug)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            secs: AtomicI64::new(start.timestamp()),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        self.secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.secs.store(to.timestamp(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        from_unix(self.secs.load(Ordering::SeqCst)).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Convert Unix seconds into a UTC instant. `None` if out of range.
pub fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_has_no_subseconds() {
        let now = SystemClock.now();
        assert_eq!(now.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = from_unix(1_705_321_845).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::seconds(65));
        assert_eq!(clock.now(), start + TimeDelta::seconds(65));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_manual_clock_truncates_start() {
        let start = from_unix(1_705_321_845).unwrap() + TimeDelta::milliseconds(750);
        let clock = ManualClock::new(start);
        assert_eq!(clock.now().timestamp(), 1_705_321_845);
        assert_eq!(clock.now().timestamp_subsec_nanos(), 0);
    }
}
