//! Resolution of asynchronous remote tasks.
//!
//! A remote service accepts a job, returns a task id, and later reports the
//! job as processing, succeeded or failed. [`Poller`] checks the status
//! repeatedly with exponential backoff until one of three outcomes:
//!
//! - success: the result is returned with the attempt count and elapsed time
//! - remote failure: [`PollError::GenerationFailed`](crate::PollError::GenerationFailed), never retried
//! - exhaustion or cancellation: [`PollError::Timeout`](crate::PollError::Timeout)
//!
//! The wait between attempts starts at the initial interval and grows by
//! [`BACKOFF_MULTIPLIER`] up to the max interval. With the defaults that is
//! `2s, 3s, 4.5s, 6.75s, 10s, 10s, ...`.

mod options;
mod policy;
mod poller;

pub use options::{PollOptions, PollOptionsBuilder, ProgressCallback, ProgressUpdate};
pub use policy::{
    BACKOFF_MULTIPLIER, Backoff, DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_INTERVAL, PollConfig, estimate_max_poll_time,
};
pub use poller::{PollOutcome, Poller};
