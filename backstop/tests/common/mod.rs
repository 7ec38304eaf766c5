//! Shared test collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use backstop::{BoxError, StatusCheck, SubmittedTask, TaskId, TaskStatus, TaskSubmit};
use tokio::time::Instant;
use tracing::span::{Attributes, Id};
use tracing::{Dispatch, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

/// Remote task service that replays a script of statuses.
///
/// Once the script is exhausted every check reports `Processing`.
#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<VecDeque<TaskStatus<String>>>,
    checks: AtomicU32,
    check_times: Mutex<Vec<Instant>>,
}

impl ScriptedApi {
    pub fn new(script: impl IntoIterator<Item = TaskStatus<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        })
    }

    /// `processing` unfinished checks followed by a success.
    pub fn succeeding_after(processing: usize, result: &str) -> Arc<Self> {
        Self::new(
            std::iter::repeat_n(TaskStatus::Processing, processing)
                .chain([TaskStatus::Success(result.to_string())]),
        )
    }

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    /// Milliseconds between consecutive status checks.
    pub fn intervals_ms(&self) -> Vec<u128> {
        let times = self.check_times.lock().unwrap();
        times
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect()
    }
}

#[async_trait]
impl StatusCheck for ScriptedApi {
    type Output = String;

    async fn check_status(&self, _task_id: &TaskId) -> Result<TaskStatus<String>, BoxError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.check_times.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or(TaskStatus::Processing))
    }
}

#[async_trait]
impl TaskSubmit<String> for ScriptedApi {
    async fn submit(&self, request: String) -> Result<SubmittedTask, BoxError> {
        if request.is_empty() {
            return Err("empty prompt".into());
        }
        Ok(SubmittedTask::new("video", format!("task-{request}")))
    }
}

/// Status check that always fails to reach the service.
pub struct UnreachableApi;

#[async_trait]
impl StatusCheck for UnreachableApi {
    type Output = String;

    async fn check_status(&self, _task_id: &TaskId) -> Result<TaskStatus<String>, BoxError> {
        Err("connection refused".into())
    }
}

/// Status check that takes a minute to answer.
#[derive(Default)]
pub struct SlowApi {
    checks: AtomicU32,
}

impl SlowApi {
    pub const LATENCY: std::time::Duration = std::time::Duration::from_secs(60);

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusCheck for SlowApi {
    type Output = String;

    async fn check_status(&self, _task_id: &TaskId) -> Result<TaskStatus<String>, BoxError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Self::LATENCY).await;
        Ok(TaskStatus::Success("late".to_string()))
    }
}

/// Captured span name and fields.
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedSpan {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

struct SpanCaptureLayer {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
}

impl<S> Layer<S> for SpanCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0,
        });
    }
}

/// Dispatcher recording every span created while it is the default.
pub fn span_capture() -> (Dispatch, Arc<Mutex<Vec<CapturedSpan>>>) {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default()
        .with(SpanCaptureLayer {
            spans: spans.clone(),
        })
        .with(tracing_subscriber::fmt::layer().with_test_writer());
    (Dispatch::new(subscriber), spans)
}
