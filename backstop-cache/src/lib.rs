#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod cache;
mod config;
mod error;
pub mod metrics;

pub use backstop_core::CacheKey;
pub use builder::{Capacity, LruCacheBuilder, NoCapacity};
pub use cache::{CacheStats, LruCache};
pub use config::CacheConfig;
pub use error::CacheError;
