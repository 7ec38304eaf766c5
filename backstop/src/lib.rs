#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cancel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod poll;
pub mod rate_limit;
pub mod resilience;
pub mod ssrf;

pub use backstop_cache::{CacheConfig, CacheError, CacheStats, LruCache, LruCacheBuilder};
pub use backstop_core::{
    BoxError, CacheKey, KeyPart, OperationId, StatusCheck, SubmittedTask, TaskId, TaskStatus,
    TaskSubmit,
};
pub use cancel::{CancellationRegistry, CancellationToken, OperationGuard};
pub use config::ResilienceConfig;
pub use error::{
    ConfigError, Error, PollError, RateLimitError, TimeoutReason, UrlRejection,
    UrlValidationError,
};
pub use poll::{PollConfig, PollOptions, PollOutcome, Poller, ProgressUpdate};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use resilience::{RateLimited, Resilience};
pub use ssrf::{UrlValidationResult, validate_url};
