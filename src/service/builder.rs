//! Build-time configuration of a `ServiceHandle`.

use std::sync::{Arc, RwLock};

use crate::action::ReloadAction;
use crate::error::{BuildError, ConfigurationError, ReloadError, TranslateError};
use crate::runtime::ReloadRuntime;
use crate::service::{Conversion, ErrorHandler, ServiceHandle, ServiceInner};
use crate::source::Source;
use crate::state::ServiceState;
use crate::translate::{Payload, Translator};
use crate::version::{ResourceId, Version};

/// Collects the pieces of a handle and validates them eagerly in `build`.
pub struct ServiceBuilder<T> {
    name: String,
    resource: ResourceId,
    source: Option<Arc<dyn Source>>,
    convert: Option<Conversion<T>>,
    initial: Option<T>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    actions: Vec<Arc<dyn ReloadAction>>,
}

impl<T: Send + Sync + 'static> ServiceBuilder<T> {
    pub fn new(name: impl Into<String>, resource: ResourceId) -> Self {
        Self {
            name: name.into(),
            resource,
            source: None,
            convert: None,
            initial: None,
            error_handler: None,
            actions: Vec::new(),
        }
    }

    pub fn source<S>(self, source: S) -> Self
    where
        S: Source + 'static,
    {
        self.shared_source(Arc::new(source))
    }

    pub fn shared_source(mut self, source: Arc<dyn Source>) -> Self {
        self.source = Some(source);
        self
    }

    /// Translator whose output is the instance itself.
    pub fn translator<Tr>(mut self, translator: Tr) -> Self
    where
        Tr: Translator<Payload, Output = T> + 'static,
    {
        self.convert = Some(Arc::new(move |payload: Payload| translator.translate(payload)));
        self
    }

    /// Translator followed by a factory building the instance.
    pub fn translator_with<Tr, F>(mut self, translator: Tr, factory: F) -> Self
    where
        Tr: Translator<Payload> + 'static,
        F: Fn(Tr::Output) -> Result<T, TranslateError> + Send + Sync + 'static,
    {
        self.convert = Some(Arc::new(move |payload: Payload| {
            factory(translator.translate(payload)?)
        }));
        self
    }

    /// Instance served until the first successful reload. Skips the
    /// initial load.
    pub fn initial(mut self, instance: T) -> Self {
        self.initial = Some(instance);
        self
    }

    pub fn error_handler<H>(self, handler: H) -> Self
    where
        H: ErrorHandler + 'static,
    {
        self.shared_error_handler(Arc::new(handler))
    }

    pub fn shared_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn action<A>(mut self, action: A) -> Self
    where
        A: ReloadAction + 'static,
    {
        self.actions.push(Arc::new(action));
        self
    }

    /// Validate and create the handle.
    ///
    /// Without an initial instance the resource is loaded once,
    /// unconditionally; that load does not run reload actions, and its
    /// failure fails the build whether or not an error handler is set.
    pub async fn build(self, runtime: &ReloadRuntime) -> Result<ServiceHandle<T>, BuildError> {
        let source = self
            .source
            .ok_or_else(|| ConfigurationError::MissingSource(self.name.clone()))?;
        let convert = self
            .convert
            .ok_or_else(|| ConfigurationError::MissingTranslator(self.name.clone()))?;

        let state = match self.initial {
            Some(instance) => {
                tracing::debug!(service = %self.name, "Using supplied initial instance");
                ServiceState::new(instance, Version::Empty)
            }
            None => {
                let initial_load = async {
                    let loaded = source.load(&self.resource).await?;
                    let instance = convert(loaded.payload)?;
                    Ok::<_, ReloadError>(ServiceState::new(instance, loaded.version))
                };
                initial_load.await.map_err(|source| BuildError::InitialLoad {
                    service: self.name.clone(),
                    source,
                })?
            }
        };

        tracing::info!(
            service = %self.name,
            resource = %self.resource,
            source = %source.describe(),
            version = %state.current_version(),
            "Service built"
        );

        Ok(ServiceHandle {
            inner: Arc::new(ServiceInner {
                name: self.name,
                resource: self.resource,
                source,
                convert,
                state,
                actions: RwLock::new(self.actions),
                error_handler: self.error_handler,
                runtime: runtime.clone(),
            }),
        })
    }
}
