//! Clock and jitter sources for position generation.
//!
//! Positions are derived from wall-clock milliseconds. Both sources are
//! injected so tests can produce tied or skewed timestamps deterministically.

use crate::Timestamp;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonically non-decreasing millisecond source.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> Timestamp;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as Timestamp)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Jump to an absolute time. Going backwards simulates skew.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advance by `millis` and return the new time.
    pub fn advance(&self, millis: Timestamp) -> Timestamp {
        self.now.fetch_add(millis, Ordering::SeqCst) + millis
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Source of the random offset added to a regenerated position.
pub trait Jitter: Send + Sync {
    /// A value in `0..=max`.
    fn next(&self, max: i64) -> i64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn next(&self, max: i64) -> i64 {
        if max <= 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=max)
    }
}

/// Always returns the same offset (capped at `max`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub i64);

impl Jitter for FixedJitter {
    fn next(&self, max: i64) -> i64 {
        self.0.clamp(0, max.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn manual_clock_holds_until_moved() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now_millis(), 1_000);

        assert_eq!(clock.advance(5), 1_005);
        assert_eq!(clock.now_millis(), 1_005);

        clock.set(900);
        assert_eq!(clock.now_millis(), 900);
    }

    #[test]
    fn random_jitter_stays_in_range() {
        for _ in 0..1_000 {
            let value = RandomJitter.next(9_999);
            assert!((0..=9_999).contains(&value));
        }
        assert_eq!(RandomJitter.next(0), 0);
        assert_eq!(RandomJitter.next(-3), 0);
    }

    #[test]
    fn fixed_jitter_is_capped() {
        assert_eq!(FixedJitter(7).next(100), 7);
        assert_eq!(FixedJitter(700).next(100), 100);
        assert_eq!(FixedJitter(-1).next(100), 0);
    }
}
