use std::time::Duration;

use backstop::{ConfigError, Resilience, ResilienceConfig};
use pretty_assertions::assert_eq;
use serial_test::serial;

#[test]
fn test_yaml_document() {
    let yaml = r#"
rate_limit:
  max_tokens: 20
  refill_rate: 2.5
  wait_interval: 50ms
poll:
  max_attempts: 60
  initial_interval: 1s
  max_interval: 15s
cache:
  max_size: 500
  ttl: 5m
"#;
    let config = ResilienceConfig::from_yaml_str(yaml).unwrap();

    assert_eq!(config.rate_limit.max_tokens, 20);
    assert_eq!(config.rate_limit.refill_rate, 2.5);
    assert_eq!(config.rate_limit.wait_interval, Duration::from_millis(50));
    assert_eq!(config.poll.max_attempts, 60);
    assert_eq!(config.poll.initial_interval, Duration::from_secs(1));
    assert_eq!(config.poll.max_interval, Duration::from_secs(15));
    assert_eq!(config.cache.max_size, 500);
    assert_eq!(config.cache.ttl, Some(Duration::from_secs(300)));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_yaml_uses_defaults() {
    let config = ResilienceConfig::from_yaml_str("poll:\n  max_attempts: 3\n").unwrap();

    assert_eq!(config.poll.max_attempts, 3);
    assert_eq!(config.poll.initial_interval, Duration::from_secs(2));
    assert_eq!(config.rate_limit, Default::default());
    assert_eq!(config.cache, Default::default());
}

#[test]
fn test_yaml_type_error() {
    let err = ResilienceConfig::from_yaml_str("rate_limit:\n  max_tokens: plenty\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    let source = std::error::Error::source(&err).expect("parser error is kept as source");
    assert!(!source.to_string().is_empty());
}

#[test]
fn test_zero_wait_interval_is_rejected() {
    let config = ResilienceConfig::from_yaml_str("rate_limit:\n  wait_interval: 0s\n").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidWaitInterval(interval)) if interval.is_zero()
    ));
    assert!(matches!(
        Resilience::from_config(&config),
        Err(ConfigError::InvalidWaitInterval(_))
    ));
}

#[test]
fn test_invalid_sections_are_rejected() {
    let config =
        ResilienceConfig::from_yaml_str("poll:\n  initial_interval: 30s\n  max_interval: 10s\n")
            .unwrap();
    assert!(matches!(
        Resilience::from_config(&config),
        Err(ConfigError::InvalidPollInterval { .. })
    ));

    let config = ResilienceConfig::from_yaml_str("cache:\n  max_size: 0\n").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Cache(_))));
}

#[test]
fn test_yaml_then_env_overrides() {
    let config = ResilienceConfig::from_yaml_str("rate_limit:\n  max_tokens: 20\n")
        .unwrap()
        .apply_env_overrides(|name| (name == "RATE_LIMIT_MAX_TOKENS").then(|| "7".to_string()))
        .unwrap();
    assert_eq!(config.rate_limit.max_tokens, 7);
}

#[test]
#[serial]
fn test_from_process_environment() {
    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("POLL_MAX_ATTEMPTS", "12");
        std::env::set_var("POLL_MAX_INTERVAL_MS", "4000");
    }
    let config = ResilienceConfig::from_env();
    unsafe {
        std::env::remove_var("POLL_MAX_ATTEMPTS");
        std::env::remove_var("POLL_MAX_INTERVAL_MS");
    }

    let config = config.unwrap();
    assert_eq!(config.poll.max_attempts, 12);
    assert_eq!(config.poll.max_interval, Duration::from_millis(4000));
}

#[test]
#[serial]
fn test_from_process_environment_invalid() {
    // SAFETY: serialized with every other test touching the environment.
    unsafe { std::env::set_var("RATE_LIMIT_MAX_TOKENS", "0") };
    let result = ResilienceConfig::from_env();
    unsafe { std::env::remove_var("RATE_LIMIT_MAX_TOKENS") };

    assert!(matches!(result, Err(ConfigError::InvalidMaxTokens(0))));
}

#[tokio::test(start_paused = true)]
async fn test_resilience_cache_from_config() {
    let config = ResilienceConfig::from_yaml_str("cache:\n  max_size: 2\n  ttl: 1s\n").unwrap();
    let resilience = Resilience::from_config(&config).unwrap();
    let cache = resilience.cache::<String, u32>().unwrap();

    cache.insert("a".to_string(), 1);
    assert_eq!(cache.max_size(), 2);
    assert_eq!(cache.default_ttl(), Some(Duration::from_secs(1)));
    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(cache.get(&"a".to_string()), None);
}
