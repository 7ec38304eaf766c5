//! Tests for TTL expiry and pruning, on tokio's paused clock.

use std::time::Duration;

use backstop_cache::{CacheConfig, CacheError, LruCache};
use tokio::time::advance;

const TTL: Duration = Duration::from_millis(1_000);
const ONE_MS: Duration = Duration::from_millis(1);

#[tokio::test(start_paused = true)]
async fn test_value_visible_until_ttl() {
    let cache = LruCache::builder().max_size(4).ttl(TTL).build().unwrap();
    cache.insert("a", 1);

    advance(TTL - ONE_MS).await;
    assert_eq!(cache.get(&"a"), Some(1));

    advance(2 * ONE_MS).await;
    assert_eq!(cache.get(&"a"), None);
    assert_eq!(cache.len(), 0, "expired entry is removed on read");
    assert_eq!(cache.stats().expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_contains_removes_expired_entry() {
    let cache = LruCache::builder().max_size(4).ttl(TTL).build().unwrap();
    cache.insert("a", 1);

    advance(TTL + ONE_MS).await;
    assert!(!cache.contains(&"a"));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_per_entry_ttl_overrides_default() {
    let cache = LruCache::builder().max_size(4).ttl(TTL).build().unwrap();
    cache.insert_with_ttl("short", 1, Duration::from_millis(100));
    cache.insert_with_ttl("long", 2, Duration::from_secs(5));
    cache.insert("default", 3);

    advance(Duration::from_millis(101)).await;
    assert_eq!(cache.get(&"short"), None);
    assert_eq!(cache.get(&"default"), Some(3));

    advance(TTL).await;
    assert_eq!(cache.get(&"default"), None);
    assert_eq!(cache.get(&"long"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_entries_without_ttl_never_expire() {
    let cache = LruCache::builder().max_size(4).build().unwrap();
    cache.insert("a", 1);

    advance(Duration::from_secs(86_400)).await;
    assert_eq!(cache.get(&"a"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_entry_ttl_never_expires() {
    let cache = LruCache::builder().max_size(4).build().unwrap();
    cache.insert_with_ttl("a", 1, Duration::MAX);

    advance(Duration::from_secs(86_400)).await;
    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.prune(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_default_ttl_never_expires() {
    let config = CacheConfig {
        max_size: 4,
        ttl: Some(Duration::from_secs(u64::MAX)),
    };
    assert!(config.validate().is_ok());
    let cache = config.build::<&str, u32>().unwrap();
    cache.insert("a", 1);
    assert_eq!(cache.get_or_insert_with("b", || 2), 2);

    advance(Duration::from_secs(86_400)).await;
    assert_eq!(cache.get(&"a"), Some(1));
    assert!(cache.contains(&"b"));
}

#[tokio::test(start_paused = true)]
async fn test_prune_removes_only_expired_entries() {
    let cache = LruCache::builder().max_size(8).ttl(TTL).build().unwrap();
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert_with_ttl("c", 3, Duration::from_secs(10));

    advance(TTL + ONE_MS).await;
    cache.insert("d", 4);

    assert_eq!(cache.prune(), 2);
    assert_eq!(cache.prune(), 0);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.keys(), vec!["d", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_reinsert_refreshes_expiry() {
    let cache = LruCache::builder().max_size(4).ttl(TTL).build().unwrap();
    cache.insert("a", 1);

    advance(TTL - ONE_MS).await;
    cache.insert("a", 2);

    advance(TTL - ONE_MS).await;
    assert_eq!(cache.get(&"a"), Some(2));
}

#[test]
fn test_config_validation() {
    let config = CacheConfig {
        max_size: 0,
        ttl: None,
    };
    assert_eq!(config.validate(), Err(CacheError::InvalidMaxSize(0)));

    let config = CacheConfig {
        max_size: 10,
        ttl: Some(Duration::ZERO),
    };
    assert_eq!(
        config.build::<u32, u32>().unwrap_err(),
        CacheError::InvalidTtl(Duration::ZERO)
    );

    let cache = CacheConfig::default().build::<u32, u32>().unwrap();
    assert_eq!(cache.max_size(), CacheConfig::DEFAULT_MAX_SIZE);
    assert_eq!(cache.default_ttl(), None);
}
