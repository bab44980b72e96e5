//! Throttler tying bucket accounting to injected clock and delay.

use crate::bucket::TokenBucket;
use crate::clock::{Clock, Delay, MonotonicClock, ThreadDelay};
use crate::config::ThrottleConfig;
use crate::error::ConfigResult;
use crate::iter::Throttled;
use std::time::Duration;
use tracing::{debug, trace};

/// Running counters for one throttler instance.
///
/// Plain fields, not atomics: a throttler has a single owner and the
/// counters travel with it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrottleStats {
    /// Elements released downstream.
    pub items: u64,

    /// Total cost debited.
    pub cost_consumed: f64,

    /// Delay invocations.
    pub delays: u64,

    /// Cumulative time requested from the delay collaborator.
    pub time_delayed: Duration,
}

impl ThrottleStats {
    /// Record one released element and its cost.
    pub fn record_item(&mut self, cost: f64) {
        self.items += 1;
        self.cost_consumed += cost;
    }

    /// Record one delay invocation.
    pub fn record_delay(&mut self, requested: Duration) {
        self.delays += 1;
        self.time_delayed = self.time_delayed.saturating_add(requested);
    }
}

/// Throttles consumption of a sequence with the token-bucket algorithm.
///
/// A throttler owns its bucket state plus two injected collaborators: a
/// monotonic [`Clock`] and a [`Delay`] invoked when the bucket runs dry.
/// The defaults ([`MonotonicClock`], [`ThreadDelay`]) give a blocking,
/// real-time limiter; tests swap in a manual clock and a delay that
/// advances it.
///
/// One logical consumer per instance. Wrap the throttler in a mutex if
/// several threads must share one rate budget.
pub struct Throttler<C = MonotonicClock, D = ThreadDelay> {
    /// Configuration the bucket was built from.
    config: ThrottleConfig,

    /// Bucket state.
    bucket: TokenBucket,

    /// Time source.
    clock: C,

    /// Pause collaborator.
    delay: D,

    /// Counters.
    stats: ThrottleStats,
}

impl<C, D> std::fmt::Debug for Throttler<C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("config", &self.config)
            .field("bucket", &self.bucket)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Throttler {
    /// Create a blocking throttler on the system clock.
    pub fn new(config: ThrottleConfig) -> ConfigResult<Self> {
        Self::with_clock_and_delay(config, MonotonicClock::new(), ThreadDelay)
    }
}

impl<D: Delay> Throttler<MonotonicClock, D> {
    /// Create a throttler on the system clock with a custom delay, for
    /// hosts that idle differently than a thread sleep.
    pub fn with_delay(config: ThrottleConfig, delay: D) -> ConfigResult<Self> {
        Self::with_clock_and_delay(config, MonotonicClock::new(), delay)
    }
}

impl<C: Clock, D: Delay> Throttler<C, D> {
    /// Create a throttler with explicit clock and delay collaborators.
    ///
    /// Fails with [`ConfigError`](crate::ConfigError) on an invalid
    /// configuration; nothing is constructed in that case.
    pub fn with_clock_and_delay(config: ThrottleConfig, clock: C, delay: D) -> ConfigResult<Self> {
        config.validate()?;

        let bucket = TokenBucket::new(&config, clock.now());
        debug!(
            rate_per_second = config.rate_per_second,
            tic_interval = ?config.tic_interval,
            initial_tokens = bucket.available(),
            "throttler ready"
        );

        Ok(Self {
            config,
            bucket,
            clock,
            delay,
            stats: ThrottleStats::default(),
        })
    }

    /// Block until `cost` capacity units are available, then debit them.
    ///
    /// Refills first, waits at most once for the computed duration, refills
    /// again to credit the elapsed wait, and debits. The single wait is the
    /// only suspension point; an oversized cost produces an arbitrarily
    /// long wait rather than an error.
    pub fn acquire(&mut self, cost: f64) {
        self.bucket.refill(self.clock.now());

        if self.bucket.available() < cost {
            let wait = self.bucket.wait_for(cost, self.clock.now());
            trace!(cost, wait = ?wait, available = self.bucket.available(), "bucket dry");
            self.delay.delay(wait);
            self.stats.record_delay(wait);
            self.bucket.refill(self.clock.now());
        }

        self.bucket.debit(cost);
        self.stats.record_item(cost);
    }

    /// Wrap a sequence so that each element costs one capacity unit.
    ///
    /// The adapter is lazy, forward-only, and yields elements in exactly
    /// the upstream order; it only ever delays them.
    pub fn throttle<I>(&mut self, source: I) -> Throttled<'_, I::IntoIter, fn(&I::Item) -> f64, C, D>
    where
        I: IntoIterator,
    {
        Throttled::new(self, source.into_iter(), None)
    }

    /// Wrap a sequence with a per-element cost function.
    ///
    /// `cost` must return a non-negative value and runs synchronously
    /// before the wait decision, so it should be fast.
    pub fn throttle_with_cost<I, F>(
        &mut self,
        source: I,
        cost: F,
    ) -> Throttled<'_, I::IntoIter, F, C, D>
    where
        I: IntoIterator,
        F: FnMut(&I::Item) -> f64,
    {
        Throttled::new(self, source.into_iter(), Some(cost))
    }

    /// Currently available tokens.
    #[must_use]
    pub fn available(&self) -> f64 {
        self.bucket.available()
    }

    /// The bucket state.
    #[must_use]
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ThrottleStats {
        self.stats
    }
}
