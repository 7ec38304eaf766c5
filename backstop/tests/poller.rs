mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use backstop::poll::estimate_max_poll_time;
use backstop::{
    CancellationToken, PollConfig, PollError, PollOptions, Poller, ProgressUpdate, TaskId,
    TaskStatus, TimeoutReason,
};
use common::{ScriptedApi, SlowApi, UnreachableApi, span_capture};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

fn task() -> TaskId {
    TaskId::from("task-1")
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt() {
    let api = ScriptedApi::succeeding_after(0, "https://cdn.example.com/v.mp4");
    let poller = Poller::new(api.clone());

    let outcome = poller
        .poll_for_result(&task(), &poller.options())
        .await
        .unwrap();

    assert_eq!(outcome.result, "https://cdn.example.com/v.mp4");
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.elapsed, Duration::ZERO);
    assert_eq!(api.checks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_between_attempts() {
    let api = ScriptedApi::succeeding_after(6, "done");
    let poller = Poller::new(api.clone());

    let outcome = poller
        .poll_for_result(&task(), &poller.options())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 7);
    assert_eq!(api.intervals_ms(), vec![2000, 3000, 4500, 6750, 10000, 10000]);
    assert_eq!(outcome.elapsed, Duration::from_millis(36250));
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_is_not_retried() {
    let api = ScriptedApi::new([
        TaskStatus::Processing,
        TaskStatus::Processing,
        TaskStatus::Error("content policy violation".to_string()),
        TaskStatus::Success("never reached".to_string()),
    ]);
    let poller = Poller::new(api.clone());

    let err = poller
        .poll_for_result(&task(), &poller.options())
        .await
        .unwrap_err();

    match err {
        PollError::GenerationFailed {
            task_id,
            message,
            attempts,
            elapsed,
        } => {
            assert_eq!(task_id, task());
            assert_eq!(message, "content policy violation");
            assert_eq!(attempts, 3);
            assert_eq!(elapsed, Duration::from_millis(5000));
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
    assert_eq!(api.checks(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_after_max_attempts() {
    let api = ScriptedApi::new([]);
    let config = PollConfig {
        max_attempts: 4,
        ..PollConfig::default()
    };
    let poller = Poller::with_config(api.clone(), config);

    let err = poller
        .poll_for_result(&task(), &poller.options())
        .await
        .unwrap_err();

    match err {
        PollError::Timeout {
            attempts,
            elapsed,
            reason,
            ..
        } => {
            assert_eq!(attempts, 4);
            assert_eq!(reason, TimeoutReason::AttemptsExhausted);
            assert_eq!(elapsed, estimate_max_poll_time(&config));
            assert_eq!(elapsed, Duration::from_millis(9500));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert_eq!(api.checks(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_progress_reported_per_attempt() {
    let api = ScriptedApi::succeeding_after(2, "done");
    let updates = Arc::new(Mutex::new(Vec::new()));
    let options = PollOptions::builder()
        .max_attempts(5)
        .on_progress({
            let updates = updates.clone();
            move |update: &ProgressUpdate| updates.lock().unwrap().push(update.clone())
        })
        .build();

    Poller::new(api)
        .poll_for_result(&task(), &options)
        .await
        .unwrap();

    let updates = updates.lock().unwrap();
    let attempts: Vec<(u32, u32)> = updates
        .iter()
        .map(|update| (update.attempt, update.max_attempts))
        .collect();
    assert_eq!(attempts, vec![(1, 5), (2, 5), (3, 5)]);
    assert!(updates.iter().all(|update| !update.message.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_makes_no_calls() {
    let api = ScriptedApi::succeeding_after(0, "done");
    let token = CancellationToken::new();
    token.cancel();
    let options = PollOptions::builder().cancellation(token).build();

    let err = Poller::new(api.clone())
        .poll_for_result(&task(), &options)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), Some(0));
    assert_eq!(api.checks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_backoff_sleep() {
    let api = ScriptedApi::new([]);
    let token = CancellationToken::new();
    let options = PollOptions::builder().cancellation(token.clone()).build();
    let poller = Poller::new(api.clone());

    let session = tokio::spawn(async move { poller.poll_for_result(&task(), &options).await });

    // second check happens at 2s, the next one would be at 5s
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let cancelled_at = Instant::now();
    token.cancel();

    let err = session.await.unwrap().unwrap_err();
    assert_eq!(cancelled_at.elapsed(), Duration::ZERO);
    match err {
        PollError::Timeout {
            attempts,
            elapsed,
            reason,
            ..
        } => {
            assert_eq!(reason, TimeoutReason::Cancelled);
            assert_eq!(attempts, 2);
            assert_eq!(elapsed, Duration::from_millis(2500));
        }
        other => panic!("expected cancelled Timeout, got {other:?}"),
    }
    assert_eq!(api.checks(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_inflight_check() {
    let api = Arc::new(SlowApi::default());
    let token = CancellationToken::new();
    let options = PollOptions::builder().cancellation(token.clone()).build();
    let poller = Poller::new(api.clone());

    let session = tokio::spawn(async move { poller.poll_for_result(&task(), &options).await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(api.checks(), 1);
    let cancelled_at = Instant::now();
    token.cancel();

    let err = session.await.unwrap().unwrap_err();
    assert_eq!(cancelled_at.elapsed(), Duration::ZERO);
    match err {
        PollError::Timeout {
            attempts,
            elapsed,
            reason,
            ..
        } => {
            assert_eq!(reason, TimeoutReason::Cancelled);
            assert_eq!(attempts, 1);
            assert_eq!(elapsed, Duration::from_millis(500));
            assert!(elapsed < SlowApi::LATENCY);
        }
        other => panic!("expected cancelled Timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_propagated() {
    let poller = Poller::new(UnreachableApi);

    let err = poller
        .poll_for_result(&task(), &poller.options())
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::StatusCheck { attempt: 1, .. }));
    assert_eq!(
        std::error::Error::source(&err).map(ToString::to_string),
        Some("connection refused".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_poll() {
    let api = ScriptedApi::succeeding_after(1, "clip");
    let poller = Poller::new(api.clone());

    let outcome = poller
        .submit_and_poll("sunset".to_string(), &poller.options())
        .await
        .unwrap();
    assert_eq!(outcome.result, "clip");
    assert_eq!(outcome.attempts, 2);

    let err = poller
        .submit_and_poll(String::new(), &poller.options())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Submit(_)));
    assert_eq!(err.attempts(), None);
}

#[tokio::test(start_paused = true)]
async fn test_session_span_fields() {
    let (dispatch, spans) = span_capture();
    let _guard = tracing::dispatcher::set_default(&dispatch);

    let poller = Poller::new(ScriptedApi::succeeding_after(0, "done"));
    poller
        .submit_and_poll("cat".to_string(), &poller.options())
        .await
        .unwrap();

    let spans = spans.lock().unwrap();
    let poll = spans
        .iter()
        .find(|span| span.name == "poll")
        .expect("poll span");
    assert_eq!(poll.field("task_id"), Some("task-cat"));
    assert_eq!(poll.field("task_type"), Some("video"));
    assert_eq!(poll.field("max_attempts"), Some("150"));
}
