//! Resilience layer configuration.
//!
//! Configuration is loaded from a YAML document, from the environment, or
//! both (YAML first, then environment overrides):
//!
//! ```yaml
//! rate_limit:
//!   max_tokens: 20
//!   refill_rate: 2.5
//!   wait_interval: 50ms
//! poll:
//!   max_attempts: 60
//!   initial_interval: 1s
//!   max_interval: 15s
//! cache:
//!   max_size: 500
//!   ttl: 5m
//! ```
//!
//! Every field is optional and falls back to its documented default.
//!
//! ## Environment variables
//!
//! | Variable                   | Field                         |
//! |----------------------------|-------------------------------|
//! | `RATE_LIMIT_MAX_TOKENS`    | `rate_limit.max_tokens`       |
//! | `RATE_LIMIT_REFILL_RATE`   | `rate_limit.refill_rate`      |
//! | `POLL_MAX_ATTEMPTS`        | `poll.max_attempts`           |
//! | `POLL_INITIAL_INTERVAL_MS` | `poll.initial_interval` in ms |
//! | `POLL_MAX_INTERVAL_MS`     | `poll.max_interval` in ms     |

use std::str::FromStr;
use std::time::Duration;

use backstop_cache::CacheConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::poll::PollConfig;
use crate::rate_limit::RateLimitConfig;

/// Bucket capacity override.
pub const ENV_RATE_LIMIT_MAX_TOKENS: &str = "RATE_LIMIT_MAX_TOKENS";
/// Refill rate override, tokens per second.
pub const ENV_RATE_LIMIT_REFILL_RATE: &str = "RATE_LIMIT_REFILL_RATE";
/// Poll attempt limit override.
pub const ENV_POLL_MAX_ATTEMPTS: &str = "POLL_MAX_ATTEMPTS";
/// Initial poll interval override, milliseconds.
pub const ENV_POLL_INITIAL_INTERVAL_MS: &str = "POLL_INITIAL_INTERVAL_MS";
/// Max poll interval override, milliseconds.
pub const ENV_POLL_MAX_INTERVAL_MS: &str = "POLL_MAX_INTERVAL_MS";

/// Configuration of every resilience component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Outbound call admission.
    pub rate_limit: RateLimitConfig,
    /// Remote task polling.
    pub poll: PollConfig,
    /// Lookup memoization.
    pub cache: CacheConfig,
}

impl ResilienceConfig {
    /// Parse a YAML document. The result is not validated.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse(err.into()))
    }

    /// Defaults with overrides from the process environment, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides from `lookup`, validated.
    ///
    /// `lookup` maps a variable name to its value, so callers and tests can
    /// supply variables without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::default().apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace fields whose variable is set. Empty values are ignored.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(max_tokens) = env_value(&lookup, ENV_RATE_LIMIT_MAX_TOKENS)? {
            self.rate_limit.max_tokens = max_tokens;
        }
        if let Some(refill_rate) = env_value(&lookup, ENV_RATE_LIMIT_REFILL_RATE)? {
            self.rate_limit.refill_rate = refill_rate;
        }
        if let Some(max_attempts) = env_value(&lookup, ENV_POLL_MAX_ATTEMPTS)? {
            self.poll.max_attempts = max_attempts;
        }
        if let Some(ms) = env_value(&lookup, ENV_POLL_INITIAL_INTERVAL_MS)? {
            self.poll.initial_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value(&lookup, ENV_POLL_MAX_INTERVAL_MS)? {
            self.poll.max_interval = Duration::from_millis(ms);
        }
        Ok(self)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.poll.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

fn env_value<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| ConfigError::Env {
        name,
        value: raw.clone(),
    })
}
