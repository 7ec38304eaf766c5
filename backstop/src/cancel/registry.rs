//! CancellationRegistry implementation.

use std::borrow::Borrow;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use backstop_core::OperationId;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::metrics;

#[derive(Debug)]
struct Registration {
    token: CancellationToken,
    generation: u64,
}

/// Internal state shared across clones.
#[derive(Debug, Default)]
struct RegistryInner {
    operations: DashMap<OperationId, Registration>,
    generation: AtomicU64,
}

/// Maps operation ids to cancellation tokens.
///
/// Holds at most one live entry per id. An entry is created when an operation
/// starts and removed when it completes or is cancelled, whichever happens
/// first. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct CancellationRegistry {
    inner: Arc<RegistryInner>,
}

impl CancellationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation and return its cancellation token.
    ///
    /// If the id is still registered, the previous operation is cancelled and
    /// replaced. Callers must pair this with
    /// [`complete_operation`](Self::complete_operation); prefer
    /// [`start`](Self::start) or [`run`](Self::run), which do it automatically.
    pub fn create_cancellable_operation(&self, id: impl Into<OperationId>) -> CancellationToken {
        self.register(id.into()).0
    }

    /// Register an operation and return a guard that completes it on drop.
    pub fn start(&self, id: impl Into<OperationId>) -> OperationGuard {
        let id = id.into();
        let (token, generation) = self.register(id.clone());
        OperationGuard {
            registry: self.clone(),
            id,
            generation,
            token,
        }
    }

    /// Run `operation` with a freshly registered token.
    ///
    /// The entry is removed when the future finishes or is dropped, on every
    /// path.
    pub async fn run<F, Fut, T>(&self, id: impl Into<OperationId>, operation: F) -> T
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.start(id);
        let span = info_span!("cancellable_operation", operation = %guard.id());
        let result = operation(guard.token().clone()).instrument(span).await;
        drop(guard);
        result
    }

    fn register(&self, id: OperationId) -> (CancellationToken, u64) {
        let token = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.inner.operations.insert(
            id.clone(),
            Registration {
                token: token.clone(),
                generation,
            },
        );
        if let Some(previous) = previous {
            warn!(operation = %id, "Operation id registered twice - cancelling previous operation");
            previous.token.cancel();
        }
        debug!(operation = %id, "Operation registered");
        metrics::record_active_operations(self.inner.operations.len());
        (token, generation)
    }

    /// Cancel an operation and remove its entry.
    ///
    /// Returns `false` if the id is unknown or already completed.
    pub fn cancel_operation<Q>(&self, id: &Q) -> bool
    where
        OperationId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.inner.operations.remove(id) {
            Some((id, registration)) => {
                registration.token.cancel();
                debug!(operation = %id, "Operation cancelled");
                metrics::record_cancellation();
                metrics::record_active_operations(self.inner.operations.len());
                true
            }
            None => false,
        }
    }

    /// Remove an operation's entry without cancelling it.
    ///
    /// Safe to call on unknown or already-removed ids.
    pub fn complete_operation<Q>(&self, id: &Q)
    where
        OperationId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some((id, _)) = self.inner.operations.remove(id) {
            debug!(operation = %id, "Operation completed");
            metrics::record_active_operations(self.inner.operations.len());
        }
    }

    fn complete_generation(&self, id: &OperationId, generation: u64) {
        let removed = self
            .inner
            .operations
            .remove_if(id, |_, registration| registration.generation == generation);
        if removed.is_some() {
            debug!(operation = %id, "Operation completed");
            metrics::record_active_operations(self.inner.operations.len());
        }
    }

    /// Cancel every registered operation. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<OperationId> = self
            .inner
            .operations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.iter().filter(|id| self.cancel_operation(*id)).count()
    }

    /// Token of a registered operation.
    pub fn token<Q>(&self, id: &Q) -> Option<CancellationToken>
    where
        OperationId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .operations
            .get(id)
            .map(|entry| entry.token.clone())
    }

    /// Check if an operation is registered.
    pub fn is_active<Q>(&self, id: &Q) -> bool
    where
        OperationId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.operations.contains_key(id)
    }

    /// Number of registered operations.
    pub fn active_operation_count(&self) -> usize {
        self.inner.operations.len()
    }
}

/// Registration handle returned by [`CancellationRegistry::start`].
///
/// Dropping the guard completes the operation. A guard only removes its own
/// registration: if the id was cancelled and registered again, the newer
/// entry is left alone.
#[derive(Debug)]
pub struct OperationGuard {
    registry: CancellationRegistry,
    id: OperationId,
    generation: u64,
    token: CancellationToken,
}

impl OperationGuard {
    /// Id the operation is registered under.
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// Token to pass to every wait of the operation.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Check if the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.registry.complete_generation(&self.id, self.generation);
    }
}
