//! Per-session poll options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use super::PollConfig;

/// Progress reported before every status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Attempt about to be made, starting at 1.
    pub attempt: u32,
    /// Attempt limit of the session.
    pub max_attempts: u32,
    /// Human-readable status line.
    pub message: String,
}

/// Callback receiving [`ProgressUpdate`]s.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Options for one [`Poller`](super::Poller) session.
///
/// Build with [`PollOptions::builder`], or convert a [`PollConfig`] when no
/// callback or cancellation is needed.
#[derive(Clone, Default)]
pub struct PollOptions {
    pub(crate) config: PollConfig,
    pub(crate) task_type: Option<SmolStr>,
    pub(crate) on_progress: Option<ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl PollOptions {
    /// Start building options from the default [`PollConfig`].
    pub fn builder() -> PollOptionsBuilder {
        PollOptionsBuilder::default()
    }

    /// Attempt limits and intervals.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Cancellation token, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Label used in logs and metrics.
    pub fn task_type(&self) -> &str {
        self.task_type.as_deref().unwrap_or("task")
    }

    pub(crate) fn report(&self, update: &ProgressUpdate) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(update);
        }
    }
}

impl From<PollConfig> for PollOptions {
    fn from(config: PollConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollOptions")
            .field("config", &self.config)
            .field("task_type", &self.task_type)
            .field("on_progress", &self.on_progress.as_ref().map(|_| ".."))
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

/// By-value builder for [`PollOptions`].
///
/// ```
/// use std::time::Duration;
/// use backstop::poll::PollOptions;
///
/// let options = PollOptions::builder()
///     .max_attempts(20)
///     .initial_interval(Duration::from_millis(500))
///     .on_progress(|update| println!("{}", update.message))
///     .build();
/// assert_eq!(options.config().max_attempts, 20);
/// ```
#[derive(Default)]
pub struct PollOptionsBuilder {
    options: PollOptions,
}

impl PollOptionsBuilder {
    /// Replace attempt limits and intervals at once.
    pub fn config(self, config: PollConfig) -> Self {
        Self {
            options: PollOptions {
                config,
                ..self.options
            },
        }
    }

    /// Status checks before giving up.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.options.config.max_attempts = max_attempts;
        self
    }

    /// Wait after the first unfinished attempt.
    pub fn initial_interval(mut self, interval: Duration) -> Self {
        self.options.config.initial_interval = interval;
        self
    }

    /// Upper bound of the wait between attempts.
    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.options.config.max_interval = interval;
        self
    }

    /// Label used in logs and metrics.
    pub fn task_type(self, task_type: impl Into<SmolStr>) -> Self {
        Self {
            options: PollOptions {
                task_type: Some(task_type.into()),
                ..self.options
            },
        }
    }

    /// Called once per attempt, before the status check.
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback(Arc::new(callback))
    }

    /// Shared form of [`on_progress`](Self::on_progress).
    pub fn progress_callback(self, callback: ProgressCallback) -> Self {
        Self {
            options: PollOptions {
                on_progress: Some(callback),
                ..self.options
            },
        }
    }

    /// Token that aborts the session when cancelled.
    pub fn cancellation(self, token: CancellationToken) -> Self {
        Self {
            options: PollOptions {
                cancellation: Some(token),
                ..self.options
            },
        }
    }

    /// Finish building.
    pub fn build(self) -> PollOptions {
        self.options
    }
}
