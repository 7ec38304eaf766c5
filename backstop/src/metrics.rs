//! Resilience layer metrics.
//!
//! Enable the `metrics` feature to record these metrics; without it every
//! recorder is a no-op.
//!
//! ## Metrics
//!
//! - `backstop_rate_limit_acquired_total` / `backstop_rate_limit_denied_total` - admission outcomes (counters)
//! - `backstop_rate_limit_wait_total` - `wait_for_token` calls that had to sleep (counter)
//! - `backstop_poll_attempt_total` - status checks issued (counter)
//! - `backstop_poll_outcome_total` - finished poll sessions, labeled by `outcome` (counter)
//! - `backstop_poll_duration_seconds` - poll session duration (histogram)
//! - `backstop_cancellable_operations` - registered operations (gauge)
//! - `backstop_cancelled_operation_total` - explicit cancellations (counter)
//! - `backstop_url_rejected_total` - URLs rejected, labeled by `reason` (counter)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

use std::time::Duration;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for admitted calls.
    pub static ref RATE_LIMIT_ACQUIRED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_rate_limit_acquired_total",
            "Total number of rate limit tokens handed out."
        );
        "backstop_rate_limit_acquired_total"
    };
    /// Metric name for denied admissions.
    pub static ref RATE_LIMIT_DENIED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_rate_limit_denied_total",
            "Total number of admission attempts that found the bucket empty."
        );
        "backstop_rate_limit_denied_total"
    };
    /// Metric name for waits that slept at least once.
    pub static ref RATE_LIMIT_WAIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_rate_limit_wait_total",
            "Total number of token waits that had to sleep before admission."
        );
        "backstop_rate_limit_wait_total"
    };
    /// Metric name for poll attempts.
    pub static ref POLL_ATTEMPT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_poll_attempt_total",
            "Total number of task status checks issued by the poller."
        );
        "backstop_poll_attempt_total"
    };
    /// Metric name for poll session outcomes.
    pub static ref POLL_OUTCOME_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_poll_outcome_total",
            "Total number of finished poll sessions by outcome."
        );
        "backstop_poll_outcome_total"
    };
    /// Metric name for poll session duration.
    pub static ref POLL_DURATION_HISTOGRAM: &'static str = {
        metrics::describe_histogram!(
            "backstop_poll_duration_seconds",
            metrics::Unit::Seconds,
            "Time from the first status check to the end of a poll session."
        );
        "backstop_poll_duration_seconds"
    };
    /// Metric name for the registered operations gauge.
    pub static ref ACTIVE_OPERATIONS: &'static str = {
        metrics::describe_gauge!(
            "backstop_cancellable_operations",
            "Current number of operations registered for cancellation."
        );
        "backstop_cancellable_operations"
    };
    /// Metric name for explicit cancellations.
    pub static ref CANCELLATION_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_cancelled_operation_total",
            "Total number of operations cancelled through the registry."
        );
        "backstop_cancelled_operation_total"
    };
    /// Metric name for rejected URLs.
    pub static ref URL_REJECTED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backstop_url_rejected_total",
            "Total number of URLs rejected by SSRF validation."
        );
        "backstop_url_rejected_total"
    };
}

/// Record an admission outcome.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_acquire(acquired: bool) {
    let name = if acquired {
        *RATE_LIMIT_ACQUIRED_COUNTER
    } else {
        *RATE_LIMIT_DENIED_COUNTER
    };
    metrics::counter!(name).increment(1);
}

/// Record an admission outcome (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_acquire(_acquired: bool) {}

/// Record a token wait that slept before admission.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_wait() {
    metrics::counter!(*RATE_LIMIT_WAIT_COUNTER).increment(1);
}

/// Record a token wait that slept before admission (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_wait() {}

/// Record one status check.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_poll_attempt(task_type: &str) {
    metrics::counter!(*POLL_ATTEMPT_COUNTER, "task_type" => task_type.to_string()).increment(1);
}

/// Record one status check (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_poll_attempt(_task_type: &str) {}

/// Record the end of a poll session.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_poll_outcome(task_type: &str, outcome: &'static str, elapsed: Duration) {
    let task_type = task_type.to_string();
    metrics::counter!(*POLL_OUTCOME_COUNTER, "task_type" => task_type.clone(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!(*POLL_DURATION_HISTOGRAM, "task_type" => task_type)
        .record(elapsed.as_secs_f64());
}

/// Record the end of a poll session (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_poll_outcome(_task_type: &str, _outcome: &'static str, _elapsed: Duration) {}

/// Record the number of registered operations.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_active_operations(count: usize) {
    metrics::gauge!(*ACTIVE_OPERATIONS).set(count as f64);
}

/// Record the number of registered operations (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_active_operations(_count: usize) {}

/// Record one explicit cancellation.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_cancellation() {
    metrics::counter!(*CANCELLATION_COUNTER).increment(1);
}

/// Record one explicit cancellation (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_cancellation() {}

/// Record a rejected URL.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_url_rejection(reason: &'static str) {
    metrics::counter!(*URL_REJECTED_COUNTER, "reason" => reason).increment(1);
}

/// Record a rejected URL (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_url_rejection(_reason: &'static str) {}
