//! # trickle
//!
//! Token-bucket pacing for iterators and streams. Wrap any producer and
//! consume it at a configured rate, in items per second, bytes per second,
//! or any unit a cost function measures, without touching the producer.
//!
//! ## Features
//!
//! - Token-bucket accounting with configurable tic granularity and burst
//! - Blocking [`Iterator`] adapter driven by injected clock and delay
//! - Async [`Stream`](futures_util::Stream) adapter on the tokio timer
//! - Per-element cost functions for weighted limiting
//! - Deterministic tests via [`ManualClock`] or tokio's paused time
//!
//! ## Example
//!
//! ```
//! use trickle::{ThrottleConfig, Throttler};
//!
//! let config = ThrottleConfig::new(1000.0).with_initial_bucket_size(10.0);
//! let mut throttler = Throttler::new(config)?;
//!
//! let paced: Vec<u32> = throttler.throttle(vec![1, 2, 3]).collect();
//! assert_eq!(paced, vec![1, 2, 3]);
//! # Ok::<(), trickle::ConfigError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Iterator / Stream → {refill, maybe-wait, debit} → consumer
//!                      TokenBucket (pure accounting)
//!                      Clock + Delay (injected collaborators)
//! ```
//!
//! One logical consumer drives one throttler; state is not internally
//! synchronized. Refill is computed lazily whenever the throttler is
//! touched, with missed tics batched into a single O(1) catch-up, so no
//! background timer exists.

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod iter;
pub mod limiter;
pub mod stream;

pub use bucket::TokenBucket;
pub use clock::{Clock, Delay, ManualClock, MonotonicClock, ThreadDelay};
pub use config::ThrottleConfig;
pub use error::{ConfigError, ConfigResult};
pub use iter::Throttled;
pub use limiter::{ThrottleStats, Throttler};
pub use stream::ThrottledStream;
