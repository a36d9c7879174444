//! Explicit runtime context shared by handles and loaders.
//!
//! # Responsibilities
//! - Execute reload attempts, cascaded triggers and parallel actions
//! - Bound the number of reloads running at once
//! - Broadcast shutdown to every loader started from it
//! - Keep a registry of running loaders for diagnostics
//!
//! # Lifecycle
//! ```text
//! ReloadRuntime::new(config)   (inside a tokio runtime)
//!     → handles built against it
//!     → loaders started from handles
//! ReloadRuntime::shutdown()
//!     → every loader stops, in-flight reloads finish
//! ```

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::schema::RuntimeConfig;
use crate::error::ConfigurationError;
use crate::lifecycle::Shutdown;

/// Identifier of a running loader.
pub type LoaderId = Uuid;

/// Diagnostic view of a running loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderInfo {
    pub id: LoaderId,
    pub kind: &'static str,
    pub service: String,
    pub schedule: String,
}

struct RuntimeInner {
    handle: Handle,
    reload_permits: Arc<Semaphore>,
    shutdown: Shutdown,
    loaders: DashMap<LoaderId, LoaderInfo>,
}

/// Cheaply cloneable handle to the reload worker pool.
#[derive(Clone)]
pub struct ReloadRuntime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for ReloadRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadRuntime")
            .field("available_permits", &self.inner.reload_permits.available_permits())
            .field("loaders", &self.inner.loaders.len())
            .field("shut_down", &self.inner.shutdown.is_triggered())
            .finish()
    }
}

impl ReloadRuntime {
    /// Create a runtime on the current tokio runtime.
    pub fn new(config: &RuntimeConfig) -> Result<Self, ConfigurationError> {
        let handle = Handle::try_current().map_err(|_| ConfigurationError::NoRuntime)?;
        Ok(Self::with_handle(handle, config))
    }

    pub fn with_handle(handle: Handle, config: &RuntimeConfig) -> Self {
        let permits = config.max_concurrent_reloads.max(1);
        tracing::debug!(max_concurrent_reloads = permits, "Reload runtime created");
        Self {
            inner: Arc::new(RuntimeInner {
                handle,
                reload_permits: Arc::new(Semaphore::new(permits)),
                shutdown: Shutdown::new(),
                loaders: DashMap::new(),
            }),
        }
    }

    /// Spawn a reload attempt, waiting for a free slot in the pool first.
    pub fn spawn_reload<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let runtime = self.clone();
        self.inner.handle.spawn(async move {
            let _slot = runtime.acquire_reload_slot().await;
            future.await
        })
    }

    /// Wait for a free slot in the pool and hold it until the permit drops.
    ///
    /// For drivers that alternate reload attempts with waiting: hold a slot
    /// only around each attempt.
    pub async fn acquire_reload_slot(&self) -> Option<OwnedSemaphorePermit> {
        self.inner.reload_permits.clone().acquire_owned().await.ok()
    }

    /// Spawn auxiliary work (cascades, parallel actions, loader loops).
    ///
    /// Not bounded by the reload slots: this work often runs on behalf of a
    /// reload that already holds one.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.handle.spawn(future)
    }

    pub fn available_reload_slots(&self) -> usize {
        self.inner.reload_permits.available_permits()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.inner.shutdown.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }

    /// Stop every loader started from this runtime.
    ///
    /// Reloads already running are not interrupted.
    pub fn shutdown(&self) {
        if self.inner.shutdown.trigger() {
            tracing::info!(loaders = self.inner.loaders.len(), "Reload runtime shutting down");
        }
    }

    pub(crate) fn register_loader(&self, info: LoaderInfo) -> Result<(), ConfigurationError> {
        if self.is_shut_down() {
            return Err(ConfigurationError::RuntimeShutDown);
        }
        tracing::debug!(loader = %info.id, kind = info.kind, service = %info.service, "Loader registered");
        self.inner.loaders.insert(info.id, info);
        Ok(())
    }

    pub(crate) fn deregister_loader(&self, id: &LoaderId) {
        self.inner.loaders.remove(id);
    }

    pub fn active_loaders(&self) -> Vec<LoaderInfo> {
        self.inner.loaders.iter().map(|r| r.value().clone()).collect()
    }
}
