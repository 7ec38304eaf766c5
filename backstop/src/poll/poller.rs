use std::time::Duration;

use backstop_core::{StatusCheck, TaskId, TaskStatus, TaskSubmit};
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span, trace, warn};

use super::{PollConfig, PollOptions, ProgressUpdate};
use crate::cancel::{self, sleep_or_cancel};
use crate::error::{PollError, TimeoutReason};
use crate::metrics;

/// Successful end of a poll session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome<T> {
    /// Result reported by the remote service.
    pub result: T,
    /// Status checks performed, including the successful one.
    pub attempts: u32,
    /// Time since polling started.
    pub elapsed: Duration,
}

/// Polls a [`StatusCheck`] collaborator until its task finishes.
///
/// Attempts within one session are strictly sequential. The session's
/// cancellation token is honored before every attempt, while a status check
/// is in flight, and during every backoff sleep.
#[derive(Debug, Clone)]
pub struct Poller<C> {
    client: C,
    defaults: PollConfig,
}

impl<C> Poller<C>
where
    C: StatusCheck,
{
    /// Create a poller using the default [`PollConfig`].
    pub fn new(client: C) -> Self {
        Self::with_config(client, PollConfig::default())
    }

    /// Create a poller whose [`options`](Self::options) start from `defaults`.
    pub fn with_config(client: C, defaults: PollConfig) -> Self {
        Self { client, defaults }
    }

    /// The status check collaborator.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Options with this poller's defaults and no callback or cancellation.
    pub fn options(&self) -> PollOptions {
        PollOptions::from(self.defaults)
    }

    /// Poll `task_id` until it succeeds, fails, runs out of attempts or is cancelled.
    pub async fn poll_for_result(
        &self,
        task_id: &TaskId,
        options: &PollOptions,
    ) -> Result<PollOutcome<C::Output>, PollError> {
        let span = debug_span!(
            "poll",
            task_id = %task_id,
            task_type = options.task_type(),
            max_attempts = options.config.max_attempts,
        );
        let started = Instant::now();
        let result = self
            .run_session(task_id, options, started)
            .instrument(span)
            .await;
        metrics::record_poll_outcome(options.task_type(), outcome_label(&result), started.elapsed());
        result
    }

    /// Submit `request`, then poll the task it created.
    ///
    /// The submitted task type becomes the session label unless `options`
    /// already sets one.
    pub async fn submit_and_poll<Req>(
        &self,
        request: Req,
        options: &PollOptions,
    ) -> Result<PollOutcome<C::Output>, PollError>
    where
        C: TaskSubmit<Req>,
        Req: Send + 'static,
    {
        let submitted = self.client.submit(request).await.map_err(PollError::Submit)?;
        debug!(
            task_id = %submitted.task_id,
            task_type = %submitted.task_type,
            "Task submitted"
        );
        if options.task_type.is_some() {
            return self.poll_for_result(&submitted.task_id, options).await;
        }
        let mut options = options.clone();
        options.task_type = Some(submitted.task_type);
        self.poll_for_result(&submitted.task_id, &options).await
    }

    async fn run_session(
        &self,
        task_id: &TaskId,
        options: &PollOptions,
        started: Instant,
    ) -> Result<PollOutcome<C::Output>, PollError> {
        let max_attempts = options.config.max_attempts;
        let cancellation = options.cancellation();
        let mut backoff = options.config.backoff();
        let timeout = |attempts: u32, reason: TimeoutReason| {
            let elapsed = started.elapsed();
            debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, %reason, "Poll session ended without result");
            PollError::Timeout {
                task_id: task_id.clone(),
                attempts,
                elapsed,
                reason,
            }
        };

        for attempt in 1..=max_attempts {
            if cancel::is_cancelled(cancellation) {
                return Err(timeout(attempt - 1, TimeoutReason::Cancelled));
            }

            options.report(&ProgressUpdate {
                attempt,
                max_attempts,
                message: format!("Checking task status (attempt {attempt}/{max_attempts})"),
            });
            metrics::record_poll_attempt(options.task_type());

            let checked = match cancellation {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(timeout(attempt, TimeoutReason::Cancelled)),
                    checked = self.client.check_status(task_id) => checked,
                },
                None => self.client.check_status(task_id).await,
            };
            let status = checked.map_err(|source| PollError::StatusCheck {
                task_id: task_id.clone(),
                attempt,
                source,
            })?;

            match status {
                TaskStatus::Success(result) => {
                    let elapsed = started.elapsed();
                    debug!(attempts = attempt, elapsed_ms = elapsed.as_millis() as u64, "Task succeeded");
                    return Ok(PollOutcome {
                        result,
                        attempts: attempt,
                        elapsed,
                    });
                }
                TaskStatus::Error(message) => {
                    warn!(attempts = attempt, error = %message, "Task failed remotely");
                    return Err(PollError::GenerationFailed {
                        task_id: task_id.clone(),
                        message,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                TaskStatus::Processing => {
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = backoff.next_delay();
                    trace!(attempt, delay_ms = delay.as_millis() as u64, "Task still processing");
                    if sleep_or_cancel(delay, cancellation).await.is_err() {
                        return Err(timeout(attempt, TimeoutReason::Cancelled));
                    }
                }
            }
        }

        Err(timeout(max_attempts, TimeoutReason::AttemptsExhausted))
    }
}

fn outcome_label<T>(result: &Result<PollOutcome<T>, PollError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(PollError::GenerationFailed { .. }) => "failed",
        Err(PollError::Timeout {
            reason: TimeoutReason::Cancelled,
            ..
        }) => "cancelled",
        Err(PollError::Timeout { .. }) => "timeout",
        Err(PollError::StatusCheck { .. } | PollError::Submit(_)) => "error",
    }
}
