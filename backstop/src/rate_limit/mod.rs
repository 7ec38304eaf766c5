//! Token-bucket admission control for outbound calls.
//!
//! A bucket holds up to `max_tokens` tokens and refills continuously at
//! `refill_rate` tokens per second. Refill is computed lazily from the time
//! elapsed since the last access, so no background task is needed. A caller
//! may burst through the whole bucket at once; after that admissions are
//! bounded by the refill rate.
//!
//! # Example
//!
//! ```
//! use backstop::rate_limit::RateLimiter;
//!
//! let limiter = RateLimiter::new(2, 1.0).unwrap();
//! assert!(limiter.try_acquire());
//! assert!(limiter.try_acquire());
//! assert!(!limiter.try_acquire());
//! assert!(limiter.acquire().unwrap_err().retry_after().is_some());
//! ```

mod config;
mod limiter;

pub use config::RateLimitConfig;
pub use limiter::RateLimiter;
