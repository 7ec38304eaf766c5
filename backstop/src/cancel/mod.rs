//! Cooperative cancellation of in-flight operations.
//!
//! An operation registers under an [`OperationId`](backstop_core::OperationId)
//! and receives a [`CancellationToken`]. The same token is handed to every
//! wait the operation performs (rate limiter admission, poll sleeps), so one
//! external [`cancel_operation`](CancellationRegistry::cancel_operation) call
//! interrupts whichever wait is in progress.
//!
//! # Example
//!
//! ```ignore
//! use backstop::cancel::CancellationRegistry;
//!
//! let registry = CancellationRegistry::new();
//!
//! let result = registry
//!     .run("request-42", |token| async move {
//!         limiter.wait_for_token(Some(&token)).await?;
//!         call_remote().await
//!     })
//!     .await;
//! // the entry is gone whether the call succeeded, failed or was cancelled
//! ```

mod registry;

use std::time::Duration;

pub use registry::{CancellationRegistry, OperationGuard};
pub use tokio_util::sync::CancellationToken;

/// Marker returned when a wait was interrupted by its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Sleeps for `duration` unless `token` is cancelled first.
///
/// Checks the token before sleeping, so an already-cancelled token returns
/// immediately.
pub async fn sleep_or_cancel(
    duration: Duration,
    token: Option<&CancellationToken>,
) -> Result<(), Cancelled> {
    match token {
        None => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
        Some(token) => {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Cancelled),
                _ = tokio::time::sleep(duration) => Ok(()),
            }
        }
    }
}

/// Returns `true` if a token is present and cancelled.
#[inline]
pub(crate) fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}
