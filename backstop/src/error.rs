//! Error types for the resilience layer.
//!
//! Each component has its own error so callers can tell the outcomes apart
//! and build a message from the structured context they carry:
//!
//! - [`RateLimitError`] - no token available, or a token wait was cancelled
//! - [`PollError`] - a polled task timed out, was cancelled, or failed remotely
//! - [`UrlValidationError`] - a URL was rejected before an outbound fetch
//! - [`ConfigError`] - invalid construction parameters or configuration input
//!
//! [`Error`] aggregates all of them for callers that just propagate with `?`.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use backstop_cache::CacheError;
use backstop_core::{BoxError, TaskId};
use thiserror::Error;

/// Error returned by [`RateLimiter`](crate::RateLimiter) admission calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// No token was available; one will be after `retry_after`.
    #[error("rate limit exceeded, retry after {}ms", .retry_after.as_millis())]
    Exhausted {
        /// Time until the next token becomes available.
        retry_after: Duration,
    },
    /// The token wait was cancelled before a token became available.
    #[error("waiting for a rate limit token was cancelled")]
    Cancelled,
}

impl RateLimitError {
    /// Time until the next token, for [`Exhausted`](Self::Exhausted).
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Exhausted { retry_after } => Some(*retry_after),
            Self::Cancelled => None,
        }
    }
}

/// Why a poll session ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// Every attempt reported the task as still processing.
    AttemptsExhausted,
    /// The session's cancellation token was triggered.
    Cancelled,
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptsExhausted => f.write_str("timed out"),
            Self::Cancelled => f.write_str("was cancelled"),
        }
    }
}

/// Error returned by [`Poller`](crate::Poller).
#[derive(Debug, Error)]
pub enum PollError {
    /// The task did not finish: attempts ran out or the session was cancelled.
    #[error("task {task_id} {reason} after {attempts} attempts ({}ms)", .elapsed.as_millis())]
    Timeout {
        /// Task being polled.
        task_id: TaskId,
        /// Status checks performed.
        attempts: u32,
        /// Time since polling started.
        elapsed: Duration,
        /// Exhaustion or cancellation.
        reason: TimeoutReason,
    },

    /// The remote service reported the task as failed. Never retried.
    #[error("task {task_id} failed: {message}")]
    GenerationFailed {
        /// Task being polled.
        task_id: TaskId,
        /// Failure reason reported by the service.
        message: String,
        /// Status checks performed, including the failing one.
        attempts: u32,
        /// Time since polling started.
        elapsed: Duration,
    },

    /// A status check could not be performed at all.
    #[error("status check for task {task_id} failed on attempt {attempt}")]
    StatusCheck {
        /// Task being polled.
        task_id: TaskId,
        /// Attempt during which the check failed.
        attempt: u32,
        /// Transport error from the collaborator.
        #[source]
        source: BoxError,
    },

    /// The task could not be submitted.
    #[error("task submission failed")]
    Submit(#[source] BoxError),
}

impl PollError {
    /// Status checks performed before the error, if known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Timeout { attempts, .. } | Self::GenerationFailed { attempts, .. } => {
                Some(*attempts)
            }
            Self::StatusCheck { attempt, .. } => Some(*attempt),
            Self::Submit(_) => None,
        }
    }

    /// Returns `true` if the session ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Timeout {
                reason: TimeoutReason::Cancelled,
                ..
            }
        )
    }
}

/// Reason a URL was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlRejection {
    /// The input is not an absolute URL.
    #[error("invalid URL: {0}")]
    Malformed(String),
    /// Only `http` and `https` may be fetched.
    #[error("unsupported scheme '{0}', only http and https are allowed")]
    UnsupportedScheme(String),
    /// The URL carries a username or password.
    #[error("URLs with embedded credentials are not allowed")]
    EmbeddedCredentials,
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
    /// `localhost` or a `*.localhost` name.
    #[error("localhost is not allowed")]
    Localhost,
    /// Loopback address (`127.0.0.0/8`, `::1`).
    #[error("loopback address {0} is not allowed")]
    Loopback(IpAddr),
    /// Unspecified address (`0.0.0.0`, `::`).
    #[error("unspecified address {0} is not allowed")]
    Unspecified(IpAddr),
    /// Private network address (`10/8`, `172.16/12`, `192.168/16`, `fc00::/7`).
    #[error("private network address {0} is not allowed")]
    PrivateNetwork(IpAddr),
    /// Link-local address (`169.254/16`, `fe80::/10`).
    #[error("link-local address {0} is not allowed")]
    LinkLocal(IpAddr),
    /// Known cloud metadata endpoint.
    #[error("cloud metadata endpoint {0} is not allowed")]
    MetadataEndpoint(String),
}

impl UrlRejection {
    /// Short stable name of the rejection, used as a log and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnsupportedScheme(_) => "scheme",
            Self::EmbeddedCredentials => "credentials",
            Self::MissingHost => "missing_host",
            Self::Localhost => "localhost",
            Self::Loopback(_) => "loopback",
            Self::Unspecified(_) => "unspecified",
            Self::PrivateNetwork(_) => "private",
            Self::LinkLocal(_) => "link_local",
            Self::MetadataEndpoint(_) => "metadata",
        }
    }
}

/// A URL rejected by the SSRF rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("blocked URL {url:?}: {reason}")]
pub struct UrlValidationError {
    /// The rejected input.
    pub url: String,
    /// Why it was rejected.
    pub reason: UrlRejection,
}

/// Invalid construction parameters or configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bucket must hold at least one token.
    #[error("rate limit max tokens must be positive, got {0}")]
    InvalidMaxTokens(u32),
    /// The refill rate must be a positive finite number.
    #[error("rate limit refill rate must be a positive number, got {0}")]
    InvalidRefillRate(f64),
    /// The token wait must re-check the bucket after a non-zero interval.
    #[error("rate limit wait interval must be positive, got {0:?}")]
    InvalidWaitInterval(Duration),
    /// At least one poll attempt is required.
    #[error("poll max attempts must be positive, got {0}")]
    InvalidMaxAttempts(u32),
    /// Poll intervals must be non-zero with `initial <= max`.
    #[error("invalid poll intervals: initial {initial:?}, max {max:?}")]
    InvalidPollInterval {
        /// Configured initial interval.
        initial: Duration,
        /// Configured maximum interval.
        max: Duration,
    },
    /// Invalid cache settings.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The configuration document could not be parsed.
    #[error("failed to parse configuration")]
    Parse(#[source] BoxError),
    /// An environment variable holds a value of the wrong type.
    #[error("invalid value {value:?} for environment variable {name}")]
    Env {
        /// Variable name.
        name: &'static str,
        /// Raw value found.
        value: String,
    },
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`RateLimitError`].
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    /// See [`PollError`].
    #[error(transparent)]
    Poll(#[from] PollError),
    /// See [`UrlValidationError`].
    #[error(transparent)]
    Url(#[from] UrlValidationError),
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
}
