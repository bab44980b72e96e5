//! Blocking iterator adapter.

use crate::clock::{Clock, Delay, MonotonicClock, ThreadDelay};
use crate::limiter::Throttler;

/// Iterator adapter that debits the throttler before yielding each element.
///
/// Created by [`Throttler::throttle`] and [`Throttler::throttle_with_cost`].
/// Pull-based and lazy: nothing is consumed from the source until the
/// downstream asks for it, and each `next` call runs the full
/// refill/wait/debit cycle before the element is released. Consuming the
/// adapter is destructive on the source, as with any forward-only iterator.
///
/// Errors or panics from the source iterator or the cost function surface
/// unchanged; the adapter wraps nothing and cleans up nothing.
pub struct Throttled<'a, I, F, C = MonotonicClock, D = ThreadDelay>
where
    I: Iterator,
{
    limiter: &'a mut Throttler<C, D>,
    source: I,
    cost: Option<F>,
}

impl<'a, I, F, C, D> Throttled<'a, I, F, C, D>
where
    I: Iterator,
{
    pub(crate) fn new(limiter: &'a mut Throttler<C, D>, source: I, cost: Option<F>) -> Self {
        Self {
            limiter,
            source,
            cost,
        }
    }
}

impl<I, F, C, D> Iterator for Throttled<'_, I, F, C, D>
where
    I: Iterator,
    F: FnMut(&I::Item) -> f64,
    C: Clock,
    D: Delay,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let item = self.source.next()?;
        let cost = match self.cost.as_mut() {
            Some(f) => f(&item),
            None => 1.0,
        };
        self.limiter.acquire(cost);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.source.size_hint()
    }
}

impl<I, F, C, D> std::fmt::Debug for Throttled<'_, I, F, C, D>
where
    I: Iterator,
    C: Clock,
    D: Delay,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttled")
            .field("limiter", &self.limiter.bucket())
            .field("unit_cost", &self.cost.is_none())
            .finish()
    }
}
