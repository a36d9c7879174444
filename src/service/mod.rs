//! Service handles.
//!
//! # Data Flow
//! ```text
//! ServiceBuilder (source, translator, factory, initial, error handler)
//!     → build(): validate eagerly, first load unless an initial instance is given
//!     → ServiceHandle<T>
//!
//! readers:  handle.current_instance()      lock-free
//! writers:  handle.reload(force)           see reload.rs
//! drivers:  handle.start_polling(..) / handle.start_listening(..)
//! ```
//!
//! # Design Decisions
//! - A handle always holds a valid instance once built
//! - Translator and factory are fused into one conversion at build time
//! - `Reloadable` erases `T` so handles of different types can cascade

pub mod builder;
pub mod error_handler;
pub mod reload;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::action::ReloadAction;
use crate::error::{ConfigurationError, ReloadError, TranslateError};
use crate::loader::{BackoffPolicy, LoaderHandle, ListeningLoader, PollingLoader, ScheduleSpec};
use crate::runtime::ReloadRuntime;
use crate::source::Source;
use crate::state::{ServiceState, Snapshot};
use crate::translate::Payload;
use crate::version::{ResourceId, Version};

pub use builder::ServiceBuilder;
pub use error_handler::{ErrorHandler, LoggingErrorHandler};

/// Translator and factory fused together.
pub(crate) type Conversion<T> = Arc<dyn Fn(Payload) -> Result<T, TranslateError> + Send + Sync>;

/// Type-erased view of a handle, used by actions, loaders and error handlers.
#[async_trait]
pub trait Reloadable: Send + Sync {
    fn name(&self) -> &str;

    fn resource(&self) -> &ResourceId;

    fn source(&self) -> Arc<dyn Source>;

    fn runtime(&self) -> &ReloadRuntime;

    fn current_version(&self) -> Version;

    fn is_reloading(&self) -> bool;

    async fn reload(&self, force: bool) -> Result<bool, ReloadError>;
}

pub(crate) struct ServiceInner<T> {
    pub(crate) name: String,
    pub(crate) resource: ResourceId,
    pub(crate) source: Arc<dyn Source>,
    pub(crate) convert: Conversion<T>,
    pub(crate) state: ServiceState<T>,
    pub(crate) actions: RwLock<Vec<Arc<dyn ReloadAction>>>,
    pub(crate) error_handler: Option<Arc<dyn ErrorHandler>>,
    pub(crate) runtime: ReloadRuntime,
}

/// Shared handle to a hot-swappable service instance.
pub struct ServiceHandle<T> {
    pub(crate) inner: Arc<ServiceInner<T>>,
}

impl<T> Clone for ServiceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for ServiceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.inner.name)
            .field("resource", &self.inner.resource)
            .field("source", &self.inner.source.describe())
            .field("version", &self.inner.state.current_version())
            .finish()
    }
}

impl<T: Send + Sync + 'static> ServiceHandle<T> {
    /// Start configuring a handle for `resource`.
    pub fn builder(name: impl Into<String>, resource: ResourceId) -> ServiceBuilder<T> {
        ServiceBuilder::new(name, resource)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn resource(&self) -> &ResourceId {
        &self.inner.resource
    }

    pub fn runtime(&self) -> &ReloadRuntime {
        &self.inner.runtime
    }

    pub fn current_instance(&self) -> Arc<T> {
        self.inner.state.current_instance()
    }

    pub fn current_version(&self) -> Version {
        self.inner.state.current_version()
    }

    /// Instance and version from the same reload.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.inner.state.snapshot()
    }

    /// Borrow the current instance for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.current_instance())
    }

    pub fn is_reloading(&self) -> bool {
        self.inner.state.is_reloading()
    }

    /// Append an action evaluated before every publish of this handle.
    pub fn add_action<A>(&self, action: A)
    where
        A: ReloadAction + 'static,
    {
        self.add_shared_action(Arc::new(action));
    }

    pub fn add_shared_action(&self, action: Arc<dyn ReloadAction>) {
        tracing::debug!(service = %self.inner.name, action = %action.describe(), "Reload action registered");
        self.inner
            .actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }

    pub fn action_count(&self) -> usize {
        self.inner
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// This handle behind the type-erased `Reloadable` interface.
    pub fn as_reloadable(&self) -> Arc<dyn Reloadable> {
        Arc::new(self.clone())
    }

    /// Poll the source on `schedule`.
    pub fn start_polling(&self, schedule: ScheduleSpec) -> Result<LoaderHandle, ConfigurationError> {
        PollingLoader::start(self.as_reloadable(), schedule)
    }

    /// React to push notifications from the source, retrying with `backoff`.
    pub fn start_listening(&self, backoff: BackoffPolicy) -> Result<LoaderHandle, ConfigurationError> {
        ListeningLoader::start(self.as_reloadable(), backoff)
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Reloadable for ServiceHandle<T> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn resource(&self) -> &ResourceId {
        &self.inner.resource
    }

    fn source(&self) -> Arc<dyn Source> {
        self.inner.source.clone()
    }

    fn runtime(&self) -> &ReloadRuntime {
        &self.inner.runtime
    }

    fn current_version(&self) -> Version {
        self.inner.state.current_version()
    }

    fn is_reloading(&self) -> bool {
        self.inner.state.is_reloading()
    }

    async fn reload(&self, force: bool) -> Result<bool, ReloadError> {
        ServiceHandle::reload(self, force).await
    }
}
