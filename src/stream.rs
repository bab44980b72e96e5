//! Async stream adapter on the tokio timer.

use crate::bucket::TokenBucket;
use crate::config::ThrottleConfig;
use crate::error::ConfigResult;
use crate::limiter::ThrottleStats;
use futures_util::stream::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::time::{Instant, Sleep};
use tracing::{debug, trace};

/// Stream adapter that paces items through a token bucket.
///
/// The async counterpart of [`Throttled`](crate::Throttled): the same
/// refill/wait/debit cycle runs per item, but the wait suspends on
/// [`tokio::time::sleep`] instead of blocking a thread, so the adapter acts
/// as a backpressure stage between producer and consumer. Items are
/// forwarded in order, never reordered or dropped.
///
/// Time is read from [`tokio::time::Instant`], which follows the runtime's
/// virtual clock under `start_paused` tests. Dropping the stream cancels
/// any in-flight wait; there is no cancellation token of its own.
pub struct ThrottledStream<S: Stream, F = fn(&<S as Stream>::Item) -> f64> {
    source: S,
    cost: Option<F>,
    bucket: TokenBucket,
    epoch: Instant,
    stats: ThrottleStats,
    /// Wait in progress, together with the item it will release.
    waiting: Option<Waiting<S::Item>>,
}

struct Waiting<T> {
    sleep: Pin<Box<Sleep>>,
    item: T,
    cost: f64,
}

impl<S: Stream> ThrottledStream<S> {
    /// Wrap a stream so that each item costs one capacity unit.
    pub fn new(config: ThrottleConfig, source: S) -> ConfigResult<Self> {
        Self::build(config, source, None)
    }
}

impl<S: Stream, F> ThrottledStream<S, F>
where
    F: FnMut(&S::Item) -> f64,
{
    /// Wrap a stream with a per-item cost function.
    pub fn with_cost(config: ThrottleConfig, source: S, cost: F) -> ConfigResult<Self> {
        Self::build(config, source, Some(cost))
    }

    fn build(config: ThrottleConfig, source: S, cost: Option<F>) -> ConfigResult<Self> {
        config.validate()?;

        let epoch = Instant::now();
        let bucket = TokenBucket::new(&config, std::time::Duration::ZERO);
        debug!(
            rate_per_second = config.rate_per_second,
            tic_interval = ?config.tic_interval,
            "throttled stream ready"
        );

        Ok(Self {
            source,
            cost,
            bucket,
            epoch,
            stats: ThrottleStats::default(),
            waiting: None,
        })
    }

    /// Currently available tokens.
    #[must_use]
    pub fn available(&self) -> f64 {
        self.bucket.available()
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ThrottleStats {
        self.stats
    }
}

impl<S: Stream + Unpin, F> Unpin for ThrottledStream<S, F> {}

impl<S, F> Stream for ThrottledStream<S, F>
where
    S: Stream + Unpin,
    F: FnMut(&S::Item) -> f64,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let this = Pin::into_inner(self);

        loop {
            // Finish an in-progress wait before touching the source again.
            if let Some(mut waiting) = this.waiting.take() {
                match waiting.sleep.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        this.bucket.refill(this.epoch.elapsed());
                        this.bucket.debit(waiting.cost);
                        this.stats.record_item(waiting.cost);
                        return Poll::Ready(Some(waiting.item));
                    }
                    Poll::Pending => {
                        this.waiting = Some(waiting);
                        return Poll::Pending;
                    }
                }
            }

            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    let cost = match this.cost.as_mut() {
                        Some(f) => f(&item),
                        None => 1.0,
                    };

                    this.bucket.refill(this.epoch.elapsed());
                    if this.bucket.available() >= cost {
                        this.bucket.debit(cost);
                        this.stats.record_item(cost);
                        return Poll::Ready(Some(item));
                    }

                    let wait = this.bucket.wait_for(cost, this.epoch.elapsed());
                    trace!(cost, wait = ?wait, "bucket dry, pacing stream");
                    this.stats.record_delay(wait);
                    this.waiting = Some(Waiting {
                        sleep: Box::pin(tokio::time::sleep(wait)),
                        item,
                        cost,
                    });
                    // Loop to poll the sleep so the waker is registered.
                }
                other => return other,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = usize::from(self.waiting.is_some());
        let (lower, upper) = self.source.size_hint();
        (
            lower.saturating_add(pending),
            upper.and_then(|u| u.checked_add(pending)),
        )
    }
}

impl<S, F> std::fmt::Debug for ThrottledStream<S, F>
where
    S: Stream,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledStream")
            .field("bucket", &self.bucket)
            .field("stats", &self.stats)
            .field("waiting", &self.waiting.is_some())
            .finish()
    }
}
