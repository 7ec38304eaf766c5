//! Cache metrics.
//!
//! Enable the `metrics` feature to record these metrics; without it every
//! recorder is a no-op.
//!
//! ## Metrics
//!
//! - `backstop_cache_hit_total` / `backstop_cache_miss_total` - lookups (counters)
//! - `backstop_cache_eviction_total` - least-recently-used evictions (counter)
//! - `backstop_cache_expired_total` - entries removed after their TTL (counter)
//! - `backstop_cache_entries` - current number of entries (gauge)
//!
//! All metrics carry a `cache` label with the cache's configured label.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for cache hits.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_cache_hit_total",
            "Total number of cache lookups that returned a value."
        );
        "backstop_cache_hit_total"
    };
    /// Metric name for cache misses.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_cache_miss_total",
            "Total number of cache lookups that found nothing."
        );
        "backstop_cache_miss_total"
    };
    /// Metric name for LRU evictions.
    pub static ref CACHE_EVICTION_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_cache_eviction_total",
            "Total number of entries evicted to stay within max size."
        );
        "backstop_cache_eviction_total"
    };
    /// Metric name for expired entries.
    pub static ref CACHE_EXPIRED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_cache_expired_total",
            "Total number of entries removed after their TTL elapsed."
        );
        "backstop_cache_expired_total"
    };
    /// Metric name for the entry count gauge.
    pub static ref CACHE_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "backstop_cache_entries",
            "Current number of entries in the cache."
        );
        "backstop_cache_entries"
    };
}

/// Record a lookup outcome.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_lookup(cache: &str, hit: bool) {
    let name = if hit {
        *CACHE_HIT_COUNTER
    } else {
        *CACHE_MISS_COUNTER
    };
    metrics::counter!(name, "cache" => cache.to_string()).increment(1);
}

/// Record a lookup outcome (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_lookup(_cache: &str, _hit: bool) {}

/// Record one LRU eviction.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_eviction(cache: &str) {
    metrics::counter!(*CACHE_EVICTION_COUNTER, "cache" => cache.to_string()).increment(1);
}

/// Record one LRU eviction (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_eviction(_cache: &str) {}

/// Record entries removed after expiry.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_expirations(cache: &str, count: usize) {
    metrics::counter!(*CACHE_EXPIRED_COUNTER, "cache" => cache.to_string())
        .increment(count as u64);
}

/// Record entries removed after expiry (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_expirations(_cache: &str, _count: usize) {}

/// Record the current entry count.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_size(cache: &str, entries: usize) {
    metrics::gauge!(*CACHE_ENTRIES, "cache" => cache.to_string()).set(entries as f64);
}

/// Record the current entry count (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_size(_cache: &str, _entries: usize) {}
