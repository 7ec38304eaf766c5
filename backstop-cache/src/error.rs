//! Error types for cache construction.

use std::time::Duration;

use thiserror::Error;

/// Error returned when a cache is configured with invalid parameters.
///
/// Cache operations themselves never fail; every error surfaces at
/// construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// `max_size` must hold at least one entry.
    #[error("cache max size must be positive, got {0}")]
    InvalidMaxSize(usize),

    /// A default TTL, when given, must be non-zero.
    #[error("cache ttl must be positive, got {0:?}")]
    InvalidTtl(Duration),
}
