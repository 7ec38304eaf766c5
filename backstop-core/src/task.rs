//! Remote asynchronous task contract.
//!
//! Long-running generation jobs (video, audio, ...) are submitted to a remote
//! service, which answers with a task identifier. The caller then asks for the
//! task's status until it reports one of the terminal states. The remote side
//! is reached only through two narrow traits:
//!
//! - [`TaskSubmit`] - submits a request and returns a [`SubmittedTask`]
//! - [`StatusCheck`] - returns the current [`TaskStatus`] of a task
//!
//! # Examples
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use backstop_core::{BoxError, StatusCheck, TaskId, TaskStatus};
//!
//! struct VideoApi { client: ApiClient }
//!
//! #[async_trait]
//! impl StatusCheck for VideoApi {
//!     type Output = VideoUrl;
//!
//!     async fn check_status(&self, task_id: &TaskId) -> Result<TaskStatus<VideoUrl>, BoxError> {
//!         let body = self.client.task(task_id.as_str()).await?;
//!         Ok(match body.state.as_str() {
//!             "done" => TaskStatus::Success(body.url),
//!             "failed" => TaskStatus::Error(body.reason),
//!             _ => TaskStatus::Processing,
//!         })
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use smol_str::SmolStr;

/// Boxed error returned by remote collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Identifier assigned to a task by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TaskId(SmolStr);

impl TaskId {
    /// Creates a new task id.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for TaskId {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

/// Status reported by the remote service for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus<T> {
    /// The task is still running.
    Processing,
    /// The task finished and produced a result.
    Success(T),
    /// The task failed remotely; the message is the service's reason.
    Error(String),
}

impl<T> TaskStatus<T> {
    /// Returns `true` for [`Success`](Self::Success) and [`Error`](Self::Error).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Short lowercase name of the state, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

/// A task accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTask {
    /// Kind of the task (e.g. "video", "music").
    pub task_type: SmolStr,
    /// Identifier to poll with.
    pub task_id: TaskId,
}

impl SubmittedTask {
    /// Creates a new submitted task descriptor.
    pub fn new(task_type: impl Into<SmolStr>, task_id: impl Into<TaskId>) -> Self {
        Self {
            task_type: task_type.into(),
            task_id: task_id.into(),
        }
    }
}

/// Asks the remote service for the status of a task.
///
/// Errors are transport failures (the status could not be obtained at all).
/// A task that failed remotely is reported as `Ok(TaskStatus::Error(..))`.
#[async_trait]
pub trait StatusCheck: Send + Sync {
    /// Result produced by a successful task.
    type Output: Send;

    /// Performs one status check.
    async fn check_status(&self, task_id: &TaskId) -> Result<TaskStatus<Self::Output>, BoxError>;
}

/// Submits a request as a new remote task.
#[async_trait]
pub trait TaskSubmit<Req>: StatusCheck
where
    Req: Send + 'static,
{
    /// Submits the request and returns the accepted task.
    async fn submit(&self, request: Req) -> Result<SubmittedTask, BoxError>;
}

#[async_trait]
impl<T> StatusCheck for Arc<T>
where
    T: StatusCheck + ?Sized,
{
    type Output = T::Output;

    async fn check_status(&self, task_id: &TaskId) -> Result<TaskStatus<Self::Output>, BoxError> {
        self.as_ref().check_status(task_id).await
    }
}

#[async_trait]
impl<T> StatusCheck for &T
where
    T: StatusCheck + ?Sized,
{
    type Output = T::Output;

    async fn check_status(&self, task_id: &TaskId) -> Result<TaskStatus<Self::Output>, BoxError> {
        (**self).check_status(task_id).await
    }
}

#[async_trait]
impl<T, Req> TaskSubmit<Req> for Arc<T>
where
    T: TaskSubmit<Req> + ?Sized,
    Req: Send + 'static,
{
    async fn submit(&self, request: Req) -> Result<SubmittedTask, BoxError> {
        self.as_ref().submit(request).await
    }
}

#[async_trait]
impl<T, Req> TaskSubmit<Req> for &T
where
    T: TaskSubmit<Req> + ?Sized,
    Req: Send + 'static,
{
    async fn submit(&self, request: Req) -> Result<SubmittedTask, BoxError> {
        (**self).submit(request).await
    }
}
