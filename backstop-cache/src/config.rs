use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CacheError, LruCache};

/// Serializable cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries before least-recently-used eviction.
    #[serde(default = "CacheConfig::default_max_size")]
    pub max_size: usize,
    /// Default time-to-live applied to every entry (e.g., "5m", "30s").
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Default entry limit.
    pub const DEFAULT_MAX_SIZE: usize = 100;

    fn default_max_size() -> usize {
        Self::DEFAULT_MAX_SIZE
    }

    /// Checks the settings without building a cache.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidMaxSize(self.max_size));
        }
        match self.ttl {
            Some(ttl) if ttl.is_zero() => Err(CacheError::InvalidTtl(ttl)),
            _ => Ok(()),
        }
    }

    /// Builds a cache from these settings.
    pub fn build<K, V>(&self) -> Result<LruCache<K, V>, CacheError>
    where
        K: std::hash::Hash + Eq,
    {
        LruCache::new(self.max_size, self.ttl)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: Self::DEFAULT_MAX_SIZE,
            ttl: None,
        }
    }
}
