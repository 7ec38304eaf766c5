//! Rate limiter configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a [`RateLimiter`](super::RateLimiter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Bucket capacity, the largest burst admitted at once.
    #[serde(default = "RateLimitConfig::default_max_tokens")]
    pub max_tokens: u32,
    /// Tokens added per second.
    #[serde(default = "RateLimitConfig::default_refill_rate")]
    pub refill_rate: f64,
    /// How often `wait_for_token` re-checks the bucket (e.g., "100ms").
    #[serde(
        default = "RateLimitConfig::default_wait_interval",
        with = "humantime_serde"
    )]
    pub wait_interval: Duration,
}

impl RateLimitConfig {
    /// Default bucket capacity.
    pub const DEFAULT_MAX_TOKENS: u32 = 10;
    /// Default refill rate in tokens per second.
    pub const DEFAULT_REFILL_RATE: f64 = 1.0;
    /// Default re-check interval of `wait_for_token`.
    pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(100);

    fn default_max_tokens() -> u32 {
        Self::DEFAULT_MAX_TOKENS
    }

    fn default_refill_rate() -> f64 {
        Self::DEFAULT_REFILL_RATE
    }

    fn default_wait_interval() -> Duration {
        Self::DEFAULT_WAIT_INTERVAL
    }

    /// Reject a zero capacity, a non-positive or non-finite refill rate and a
    /// zero wait interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }
        if !self.refill_rate.is_finite() || self.refill_rate <= 0.0 {
            return Err(ConfigError::InvalidRefillRate(self.refill_rate));
        }
        if self.wait_interval.is_zero() {
            return Err(ConfigError::InvalidWaitInterval(self.wait_interval));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            refill_rate: Self::DEFAULT_REFILL_RATE,
            wait_interval: Self::DEFAULT_WAIT_INTERVAL,
        }
    }
}
