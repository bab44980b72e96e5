//! Token-bucket accounting.

use crate::config::ThrottleConfig;
use std::time::Duration;

/// Token-bucket state machine.
///
/// Capacity accrues in whole tics at `tokens_per_tic` units per tic, and
/// each consumed element debits its cost. Timestamps are offsets on the
/// owning adapter's clock timeline; the bucket never reads a clock itself,
/// which lets the same accounting back both the blocking iterator adapter
/// and the async stream adapter.
///
/// Not internally synchronized. One logical consumer owns a bucket; sharing
/// one across threads requires the caller to hold a lock around the whole
/// refill/wait/debit sequence, since splitting it races the availability
/// check against the debit.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Available capacity units. Fractional values are normal.
    tokens: f64,

    /// Refill credited per tic.
    tokens_per_tic: f64,

    /// Tic granularity.
    tic_interval: Duration,

    /// Deadline of the next tic boundary.
    next_fill: Duration,
}

impl TokenBucket {
    /// Create a bucket seeded with its initial burst, with the first tic
    /// boundary one interval past `now`.
    ///
    /// The configuration is assumed validated; a zero tic interval or
    /// non-positive rate makes the accounting meaningless.
    #[must_use]
    pub fn new(config: &ThrottleConfig, now: Duration) -> Self {
        Self {
            tokens: config.initial_tokens(),
            tokens_per_tic: config.tokens_per_tic(),
            tic_interval: config.tic_interval,
            next_fill: now.saturating_add(config.tic_interval),
        }
    }

    /// Credit refills for every tic boundary that `now` has passed.
    ///
    /// Missed tics are counted with one ceiling division and credited in a
    /// single update, so a long idle gap costs the same as a short one. The
    /// deadline advances by the same whole number of intervals and always
    /// lands past `now`.
    pub fn refill(&mut self, now: Duration) {
        if now <= self.next_fill {
            return;
        }

        let elapsed = now - self.next_fill;
        let tics = elapsed.as_nanos().div_ceil(self.tic_interval.as_nanos());
        let tics = u32::try_from(tics).unwrap_or(u32::MAX);

        self.tokens += f64::from(tics) * self.tokens_per_tic;
        self.next_fill = self
            .next_fill
            .saturating_add(self.tic_interval.saturating_mul(tics));
    }

    /// Time to wait before `cost` tokens could be available.
    ///
    /// Counts the whole tics covering the deficit, truncating the division;
    /// callers refill again after waiting, which bounds the optimism of the
    /// truncation at one tic. The remainder of the current tic window is
    /// added on top: future tics only start accruing once the pending
    /// boundary arrives. Saturating arithmetic keeps the result at zero or
    /// above even when `now` has drifted past the deadline.
    #[must_use]
    pub fn wait_for(&self, cost: f64, now: Duration) -> Duration {
        if cost <= self.tokens {
            return Duration::ZERO;
        }

        let deficit = cost - self.tokens;
        let tics = (deficit / self.tokens_per_tic) as u32;

        self.tic_interval
            .saturating_mul(tics)
            .saturating_add(self.next_fill.saturating_sub(now))
    }

    /// Remove `cost` tokens.
    ///
    /// The balance may land exactly at zero or fractionally below it when
    /// float rounding leaves the post-wait refill a hair short of the cost.
    pub fn debit(&mut self, cost: f64) {
        self.tokens -= cost;
    }

    /// Currently available tokens.
    #[must_use]
    pub fn available(&self) -> f64 {
        self.tokens
    }

    /// Refill credited per tic.
    #[must_use]
    pub fn tokens_per_tic(&self) -> f64 {
        self.tokens_per_tic
    }

    /// Deadline of the next tic boundary.
    #[must_use]
    pub fn next_fill(&self) -> Duration {
        self.next_fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIC: Duration = Duration::from_millis(10);

    fn bucket(rate: f64, initial: f64) -> TokenBucket {
        let config = ThrottleConfig::new(rate)
            .with_tic_interval(TIC)
            .with_initial_bucket_size(initial);
        TokenBucket::new(&config, Duration::ZERO)
    }

    #[test]
    fn test_refill_before_deadline_is_noop() {
        let mut b = bucket(100.0, 1.0);
        let before = b.available();

        b.refill(Duration::from_millis(5));
        assert_eq!(b.available(), before);
        assert_eq!(b.next_fill(), TIC);

        // Exactly at the deadline still counts as inside the window.
        b.refill(TIC);
        assert_eq!(b.available(), before);
        assert_eq!(b.next_fill(), TIC);
    }

    #[test]
    fn test_refill_credits_one_tic() {
        let mut b = bucket(100.0, 1.0);
        let before = b.available();

        b.refill(TIC + Duration::from_nanos(1));
        assert_eq!(b.available(), before + b.tokens_per_tic());
        assert_eq!(b.next_fill(), TIC * 2);
    }

    #[test]
    fn test_idle_gap_credits_all_missed_tics_at_once() {
        let mut b = bucket(100.0, 1.0);
        let before = b.available();
        let per_tic = b.tokens_per_tic();

        // Ten whole tics past the pending deadline.
        b.refill(TIC + TIC * 10);
        assert_eq!(b.available(), before + 10.0 * per_tic);
        assert_eq!(b.next_fill(), TIC * 11);
    }

    #[test]
    fn test_refill_rounds_partial_tic_up() {
        let mut b = bucket(100.0, 1.0);
        let before = b.available();

        // 2.5 tics past the deadline credits 3 and pushes the deadline
        // past now.
        let now = TIC + Duration::from_millis(25);
        b.refill(now);
        assert_eq!(b.available(), before + 3.0 * b.tokens_per_tic());
        assert!(b.next_fill() > now);
        assert_eq!(b.next_fill(), TIC * 4);
    }

    #[test]
    fn test_wait_is_zero_when_tokens_cover_cost() {
        let b = bucket(100.0, 1.0);
        assert_eq!(b.wait_for(1.0, Duration::ZERO), Duration::ZERO);
        assert_eq!(b.wait_for(0.0, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_wait_counts_whole_tics_plus_boundary_remainder() {
        let b = bucket(100.0, 0.0);

        // Deficit of 5 tokens at 1 token per tic, asked 4ms into the
        // current window: 5 tics plus the 6ms left to the boundary.
        let wait = b.wait_for(5.0, Duration::from_millis(4));
        assert_eq!(wait, TIC * 5 + Duration::from_millis(6));
    }

    #[test]
    fn test_wait_truncates_partial_tic() {
        let b = bucket(100.0, 0.5);

        // Deficit of 0.5 tokens is under one tic, so only the boundary
        // remainder is charged.
        let wait = b.wait_for(1.0, Duration::from_millis(4));
        assert_eq!(wait, Duration::from_millis(6));
    }

    #[test]
    fn test_wait_clamps_negative_boundary_remainder() {
        let b = bucket(100.0, 0.5);

        // Past the deadline, the remainder saturates to zero instead of
        // going negative.
        let wait = b.wait_for(1.0, TIC + Duration::from_millis(5));
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn test_debit_can_leave_zero_or_negative_balance() {
        let mut b = bucket(100.0, 1.0);
        b.debit(1.0);
        assert_eq!(b.available(), 0.0);

        b.debit(0.25);
        assert!(b.available() < 0.0);
    }
}
