//! Builder for configuring [`LruCache`].

use std::hash::Hash;
use std::time::Duration;

use smol_str::SmolStr;

use crate::cache::LruCache;
use crate::error::CacheError;

/// Marker type: capacity has not been configured yet.
///
/// This is the initial state of an [`LruCacheBuilder`]. You must call
/// [`max_size()`](LruCacheBuilder::max_size) before calling `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct Capacity(pub(crate) usize);

/// Builder for creating and configuring an [`LruCache`].
///
/// Use [`LruCache::builder`] to create a new builder instance. `build()` is
/// only available once [`max_size`](Self::max_size) has been set.
///
/// # Examples
///
/// ```
/// use backstop_cache::LruCache;
/// use std::time::Duration;
///
/// let cache = LruCache::builder()
///     .label("models")
///     .max_size(500)
///     .ttl(Duration::from_secs(600))
///     .build()
///     .unwrap();
/// # cache.insert(1u32, "gpt");
/// ```
#[derive(Debug, Clone)]
pub struct LruCacheBuilder<Cap> {
    capacity: Cap,
    ttl: Option<Duration>,
    label: SmolStr,
}

impl LruCacheBuilder<NoCapacity> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            ttl: None,
            label: SmolStr::new_static("default"),
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// Inserting past this limit evicts the least recently used entry.
    pub fn max_size(self, max_size: usize) -> LruCacheBuilder<Capacity> {
        LruCacheBuilder {
            capacity: Capacity(max_size),
            ttl: self.ttl,
            label: self.label,
        }
    }
}

impl Default for LruCacheBuilder<NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cap> LruCacheBuilder<Cap> {
    /// Sets the default TTL applied to every entry.
    pub fn ttl(self, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..self
        }
    }

    /// Sets the label used in logs and metrics.
    ///
    /// # Default
    ///
    /// `"default"`
    pub fn label(self, label: impl Into<SmolStr>) -> Self {
        Self {
            label: label.into(),
            ..self
        }
    }
}

impl LruCacheBuilder<Capacity> {
    /// Builds the cache, validating size and TTL.
    pub fn build<K, V>(self) -> Result<LruCache<K, V>, CacheError>
    where
        K: Hash + Eq,
    {
        LruCache::with_label(self.capacity.0, self.ttl, self.label)
    }
}
