//! Injected time and delay collaborators.
//!
//! A [`Throttler`](crate::Throttler) never reads the system clock or sleeps
//! directly. Both concerns are constructor arguments, so the same accounting
//! runs against real time in production and against a manually driven clock
//! in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source, read as an offset from the clock's own epoch.
pub trait Clock {
    /// Current offset from the epoch. Must never decrease; a clock subject
    /// to wall-time adjustments breaks refill accounting.
    fn now(&self) -> Duration;
}

/// Delay collaborator invoked when the bucket runs dry.
pub trait Delay {
    /// Pause the calling thread for at least `duration`. The argument is
    /// never negative (unrepresentable by [`Duration`]) and may be zero.
    fn delay(&mut self, duration: Duration);
}

/// Production clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is the moment of creation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Production delay backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// a throttler and keep another to advance time from the outside, typically
/// from a [`Delay`] implementation that advances instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        self.nanos
            .fetch_add(u64::try_from(step.as_nanos()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let observer = clock.clone();

        assert_eq!(observer.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(250));
        assert_eq!(observer.now(), Duration::from_millis(250));
        clock.advance(Duration::from_millis(250));
        assert_eq!(observer.now(), Duration::from_millis(500));
    }
}
