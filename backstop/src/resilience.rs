//! Components wired together for one process.

use std::hash::Hash;

use async_trait::async_trait;
use backstop_cache::{CacheConfig, LruCache};
use backstop_core::{BoxError, OperationId, StatusCheck, TaskId, TaskStatus, TaskSubmit};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::CancellationRegistry;
use crate::config::ResilienceConfig;
use crate::error::{ConfigError, Error, PollError};
use crate::poll::{PollConfig, PollOptions, PollOutcome, Poller, ProgressCallback};
use crate::rate_limit::RateLimiter;

/// A [`StatusCheck`] that takes a rate limit token before every check.
///
/// Waits for the token instead of failing when the bucket is empty. A
/// cancelled wait is reported as a transport error.
#[derive(Debug, Clone)]
pub struct RateLimited<C> {
    inner: C,
    limiter: RateLimiter,
    cancellation: Option<CancellationToken>,
}

impl<C> RateLimited<C> {
    /// Wrap `inner`, drawing tokens from `limiter`.
    pub fn new(inner: C, limiter: RateLimiter) -> Self {
        Self {
            inner,
            limiter,
            cancellation: None,
        }
    }

    /// Abort token waits when `token` is cancelled.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self
        }
    }

    /// The wrapped collaborator.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap the collaborator.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C> StatusCheck for RateLimited<C>
where
    C: StatusCheck,
{
    type Output = C::Output;

    async fn check_status(&self, task_id: &TaskId) -> Result<TaskStatus<Self::Output>, BoxError> {
        self.limiter
            .wait_for_token(self.cancellation.as_ref())
            .await?;
        self.inner.check_status(task_id).await
    }
}

/// One rate limiter, one cancellation registry and the poll defaults.
///
/// Construct once at startup and share by cloning; clones share the bucket
/// and the registry.
#[derive(Debug, Clone)]
pub struct Resilience {
    rate_limiter: RateLimiter,
    registry: CancellationRegistry,
    poll: PollConfig,
    cache: CacheConfig,
}

impl Resilience {
    /// Assemble from existing components.
    pub fn new(rate_limiter: RateLimiter, registry: CancellationRegistry, poll: PollConfig) -> Self {
        Self {
            rate_limiter,
            registry,
            poll,
            cache: CacheConfig::default(),
        }
    }

    /// Validate `config` and construct every component from it.
    pub fn from_config(config: &ResilienceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            rate_limiter: RateLimiter::from_config(&config.rate_limit)?,
            registry: CancellationRegistry::new(),
            poll: config.poll,
            cache: config.cache.clone(),
        })
    }

    /// Shared rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Shared cancellation registry.
    pub fn registry(&self) -> &CancellationRegistry {
        &self.registry
    }

    /// Poll defaults.
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Build a cache with the configured size and TTL.
    pub fn cache<K, V>(&self) -> Result<LruCache<K, V>, ConfigError>
    where
        K: Hash + Eq,
    {
        Ok(self.cache.build()?)
    }

    /// Poller over `client` whose status checks draw from the shared limiter.
    pub fn poller<C>(&self, client: C) -> Poller<RateLimited<C>>
    where
        C: StatusCheck,
    {
        Poller::with_config(RateLimited::new(client, self.rate_limiter.clone()), self.poll)
    }

    /// Submit `request` and poll it to completion as operation `operation`.
    ///
    /// Every outbound call, the submission and each status check, takes a
    /// rate limit token first. Cancelling `operation` through
    /// [`registry`](Self::registry) aborts whichever wait is in progress. The
    /// registry entry is removed on every exit path.
    pub async fn run_remote_task<C, Req>(
        &self,
        operation: impl Into<OperationId>,
        client: &C,
        request: Req,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PollOutcome<C::Output>, Error>
    where
        C: TaskSubmit<Req>,
        Req: Send + 'static,
    {
        self.registry
            .run(operation, |token| async move {
                self.rate_limiter.wait_for_token(Some(&token)).await?;
                let submitted = client.submit(request).await.map_err(PollError::Submit)?;
                debug!(
                    task_id = %submitted.task_id,
                    task_type = %submitted.task_type,
                    "Task submitted"
                );

                let poller = Poller::with_config(
                    RateLimited::new(client, self.rate_limiter.clone())
                        .with_cancellation(token.clone()),
                    self.poll,
                );
                let mut options = PollOptions::builder()
                    .config(self.poll)
                    .task_type(submitted.task_type)
                    .cancellation(token);
                if let Some(on_progress) = on_progress {
                    options = options.progress_callback(on_progress);
                }
                let outcome = poller
                    .poll_for_result(&submitted.task_id, &options.build())
                    .await?;
                Ok::<_, Error>(outcome)
            })
            .await
    }
}
