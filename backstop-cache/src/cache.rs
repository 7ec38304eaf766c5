//! LRU cache implementation.

use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use smol_str::SmolStr;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::builder::{LruCacheBuilder, NoCapacity};
use crate::error::CacheError;
use crate::metrics;

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Hit, miss and removal counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
    /// Entries removed to keep the cache within `max_size`.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct Inner<K, V> {
    entries: Mutex<lru::LruCache<K, Entry<V>>>,
    max_size: NonZeroUsize,
    default_ttl: Option<Duration>,
    label: SmolStr,
    counters: Counters,
}

/// Bounded in-memory cache with least-recently-used eviction and TTL expiry.
///
/// Every successful [`get`](Self::get) promotes the entry to most recently
/// used; inserting past `max_size` evicts the least recently used entry.
/// Expiry is lazy: an expired entry is treated as absent and removed when it
/// is next read, or proactively by [`prune`](Self::prune).
///
/// Clones share the same storage, so one cache can be handed to several
/// components.
///
/// # Examples
///
/// ```
/// use backstop_cache::LruCache;
///
/// let cache = LruCache::new(2, None).unwrap();
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// cache.get(&"a");
/// cache.insert("c", 3);
///
/// // "b" was least recently used
/// assert!(!cache.contains(&"b"));
/// assert_eq!(cache.get(&"a"), Some(1));
/// ```
///
/// # Caveats
///
/// - Concurrent misses for the same key are not de-duplicated: each caller
///   of [`get_or_insert_with`](Self::get_or_insert_with) that misses runs its
///   own factory, and the last insert wins.
pub struct LruCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for LruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("label", &self.inner.label)
            .field("max_size", &self.inner.max_size)
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

impl LruCache<(), ()> {
    /// Creates a new [`LruCacheBuilder`].
    pub fn builder() -> LruCacheBuilder<NoCapacity> {
        LruCacheBuilder::new()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq,
{
    /// Creates a cache holding at most `max_size` entries.
    ///
    /// `ttl` is the default lifetime of every entry; `None` means entries
    /// never expire unless inserted with [`insert_with_ttl`](Self::insert_with_ttl).
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Result<Self, CacheError> {
        Self::with_label(max_size, ttl, SmolStr::new_static("default"))
    }

    pub(crate) fn with_label(
        max_size: usize,
        ttl: Option<Duration>,
        label: SmolStr,
    ) -> Result<Self, CacheError> {
        let max_size = NonZeroUsize::new(max_size).ok_or(CacheError::InvalidMaxSize(max_size))?;
        if let Some(ttl) = ttl
            && ttl.is_zero()
        {
            return Err(CacheError::InvalidTtl(ttl));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(lru::LruCache::new(max_size)),
                max_size,
                default_ttl: ttl,
                label,
                counters: Counters::default(),
            }),
        })
    }

    fn entries(&self) -> MutexGuard<'_, lru::LruCache<K, Entry<V>>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a clone of the value and marks it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        let mut entries = self.entries();
        let expired = match entries.peek(key) {
            None => {
                drop(entries);
                self.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            entries.pop(key);
            drop(entries);
            self.record_expired(1);
            self.record_miss();
            return None;
        }
        let value = entries.get(key).map(|entry| entry.value.clone());
        drop(entries);
        self.record_hit();
        value
    }

    /// Returns a clone of the value without changing its recency.
    ///
    /// Expired entries read as absent but are left in place.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        self.entries()
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Returns `true` if a live entry exists for the key.
    ///
    /// Does not change recency. An expired entry is removed.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut entries = self.entries();
        match entries.peek(key).map(|entry| entry.is_expired(now)) {
            None => false,
            Some(false) => true,
            Some(true) => {
                entries.pop(key);
                drop(entries);
                self.record_expired(1);
                false
            }
        }
    }

    /// Inserts a value using the cache-wide default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_entry(key, value, self.inner.default_ttl);
    }

    /// Inserts a value with its own TTL, overriding the default.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.insert_entry(key, value, Some(ttl));
    }

    fn insert_entry(&self, key: K, value: V, ttl: Option<Duration>) {
        // A TTL past the end of the clock never expires.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        let mut entries = self.entries();
        let replacing = entries.contains(&key);
        let displaced = entries.push(key, Entry { value, expires_at });
        let size = entries.len();
        drop(entries);
        if !replacing && displaced.is_some() {
            debug!(cache = %self.inner.label, size, "evicted least recently used entry");
            self.inner.counters.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::record_eviction(&self.inner.label);
        }
        metrics::record_size(&self.inner.label, size);
    }

    /// Removes an entry. Returns `true` if one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries();
        let removed = entries.pop(key).is_some();
        metrics::record_size(&self.inner.label, entries.len());
        removed
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries().clear();
        metrics::record_size(&self.inner.label, 0);
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Maximum number of entries.
    pub fn max_size(&self) -> usize {
        self.inner.max_size.get()
    }

    /// Default TTL applied by [`insert`](Self::insert).
    pub fn default_ttl(&self) -> Option<Duration> {
        self.inner.default_ttl
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
        }
    }

    /// Returns the cached value, or runs `factory` once, caches and returns its result.
    pub fn get_or_insert_with<F>(&self, key: K, factory: F) -> V
    where
        F: FnOnce() -> V,
        V: Clone,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = factory();
        self.insert(key, value.clone());
        value
    }

    /// Async variant of [`get_or_insert_with`](Self::get_or_insert_with).
    ///
    /// The lock is not held while the factory future runs.
    pub async fn get_or_insert_with_async<F, Fut>(&self, key: K, factory: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
        V: Clone,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = factory().await;
        self.insert(key, value.clone());
        value
    }

    /// Fallible async variant. An error is returned as is and nothing is cached.
    pub async fn try_get_or_insert_with_async<F, Fut, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        V: Clone,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = factory().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    fn record_hit(&self) {
        self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_lookup(&self.inner.label, true);
    }

    fn record_miss(&self) {
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_lookup(&self.inner.label, false);
    }

    fn record_expired(&self, count: usize) {
        trace!(cache = %self.inner.label, count, "removed expired entries");
        self.inner
            .counters
            .expirations
            .fetch_add(count as u64, Ordering::Relaxed);
        metrics::record_expirations(&self.inner.label, count);
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Removes every expired entry and returns how many were removed.
    ///
    /// Independent of recency order; live entries keep their position.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        let size = entries.len();
        drop(entries);
        if !expired.is_empty() {
            self.record_expired(expired.len());
        }
        metrics::record_size(&self.inner.label, size);
        expired.len()
    }

    /// Live keys, most recently used first.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.entries()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }
}
