use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::RateLimitConfig;
use crate::cancel::{self, sleep_or_cancel};
use crate::error::{ConfigError, RateLimitError};
use crate::metrics;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, capacity: f64, rate: f64) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

#[derive(Debug)]
struct Inner {
    capacity: u32,
    refill_rate: f64,
    wait_interval: Duration,
    bucket: Mutex<Bucket>,
}

/// Token-bucket rate limiter.
///
/// Starts full. Every admission consumes one token. Clones share the same
/// bucket, so one limiter constructed at startup can be handed to every
/// caller.
///
/// Concurrent [`wait_for_token`](Self::wait_for_token) callers are not queued:
/// whichever waiter next observes a free token takes it.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Create a limiter holding `max_tokens` and refilling `refill_rate` tokens per second.
    pub fn new(max_tokens: u32, refill_rate: f64) -> Result<Self, ConfigError> {
        Self::from_config(&RateLimitConfig {
            max_tokens,
            refill_rate,
            ..RateLimitConfig::default()
        })
    }

    /// Create a limiter from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                capacity: config.max_tokens,
                refill_rate: config.refill_rate,
                wait_interval: config.wait_interval,
                bucket: Mutex::new(Bucket {
                    tokens: f64::from(config.max_tokens),
                    last_refill: Instant::now(),
                }),
            }),
        })
    }

    fn bucket(&self) -> MutexGuard<'_, Bucket> {
        let mut bucket = self
            .inner
            .bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        bucket.refill(f64::from(self.inner.capacity), self.inner.refill_rate);
        bucket
    }

    /// Take one token if available. Never waits.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket();
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            trace!(remaining = bucket.tokens, "Rate limit token acquired");
            drop(bucket);
            metrics::record_acquire(true);
            true
        } else {
            drop(bucket);
            metrics::record_acquire(false);
            false
        }
    }

    /// Take one token or fail with the time until the next one.
    pub fn acquire(&self) -> Result<(), RateLimitError> {
        if self.try_acquire() {
            return Ok(());
        }
        let retry_after = self.time_until_next_token();
        debug!(
            retry_after_ms = retry_after.as_millis() as u64,
            "Rate limit exceeded"
        );
        Err(RateLimitError::Exhausted { retry_after })
    }

    /// Wait until a token is taken or `cancel` is triggered.
    ///
    /// Fails immediately if the token is already cancelled, and promptly if it
    /// is cancelled during the wait. The bucket is re-checked every
    /// configured wait interval.
    pub async fn wait_for_token(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), RateLimitError> {
        let mut waited = false;
        loop {
            if cancel::is_cancelled(cancel) {
                debug!("Rate limit wait cancelled");
                return Err(RateLimitError::Cancelled);
            }
            if self.try_acquire() {
                if waited {
                    metrics::record_wait();
                }
                return Ok(());
            }
            waited = true;
            if sleep_or_cancel(self.inner.wait_interval, cancel).await.is_err() {
                debug!("Rate limit wait cancelled");
                return Err(RateLimitError::Cancelled);
            }
        }
    }

    /// Tokens currently available, after refill.
    pub fn available_tokens(&self) -> f64 {
        self.bucket().tokens
    }

    /// Time until one whole token is available; zero if one already is.
    ///
    /// Rounded up to whole milliseconds.
    pub fn time_until_next_token(&self) -> Duration {
        let tokens = self.bucket().tokens;
        if tokens >= 1.0 {
            return Duration::ZERO;
        }
        let millis = ((1.0 - tokens) / self.inner.refill_rate * 1000.0).ceil();
        Duration::from_millis(millis as u64)
    }

    /// Refill the bucket to capacity.
    pub fn reset(&self) {
        let mut bucket = self
            .inner
            .bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        bucket.tokens = f64::from(self.inner.capacity);
        bucket.last_refill = Instant::now();
    }

    /// Bucket capacity.
    pub fn capacity(&self) -> u32 {
        self.inner.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.inner.refill_rate
    }
}
