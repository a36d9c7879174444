//! Reload orchestration.
//!
//! The only code path that mutates a handle's state:
//!
//! ```text
//! guard (skip if in flight, unless forced)
//!     → source fetch (conditional unless forced)
//!     → reload actions, in registration order, any may veto
//!     → translate + construct, outside any lock
//!     → publish (instance, version)
//! failures → ErrorHandler if configured, else returned to the caller
//! ```
//!
//! The in-flight flag is held by a guard, so every exit path clears it.

use std::sync::{Arc, PoisonError};
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::action::ReloadAction;
use crate::error::{ReloadError, SourceError, TranslateError};
use crate::observability::metrics::{self, ReloadOutcome};
use crate::service::{Reloadable, ServiceHandle};
use crate::source::LoadedResource;

impl<T: Send + Sync + 'static> ServiceHandle<T> {
    /// Run one reload attempt.
    ///
    /// Returns `Ok(true)` when a new instance was published and `Ok(false)`
    /// when nothing changed: another reload was in flight, the source
    /// reported no change, an action vetoed, or a failure was absorbed by
    /// the error handler.
    pub async fn reload(&self, force: bool) -> Result<bool, ReloadError> {
        let inner = &self.inner;
        let _guard = if force {
            inner.state.force_begin_reload()
        } else {
            match inner.state.try_begin_reload() {
                Some(guard) => guard,
                None => {
                    tracing::debug!(service = %inner.name, "Reload already in progress, skipping");
                    metrics::record_reload_skipped(&inner.name);
                    return Ok(false);
                }
            }
        };

        let started = Instant::now();
        metrics::record_reload_attempt(&inner.name);
        tracing::debug!(service = %inner.name, resource = %inner.resource, force, "Reload started");

        let fetched = if force {
            inner.source.load(&inner.resource).await.map(Some)
        } else {
            let seen = inner.state.current_version();
            inner.source.load_if_modified(&inner.resource, &seen).await
        };

        let loaded = match fetched {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                tracing::debug!(service = %inner.name, "Resource unchanged");
                metrics::record_reload_outcome(&inner.name, ReloadOutcome::Unchanged, started);
                return Ok(false);
            }
            Err(e) => return self.source_failed(e, started),
        };

        if !self.run_actions().await {
            tracing::info!(
                service = %inner.name,
                version = %loaded.version,
                "Reload vetoed by action, keeping current instance"
            );
            metrics::record_reload_outcome(&inner.name, ReloadOutcome::Vetoed, started);
            return Ok(false);
        }

        let instance = match (inner.convert)(loaded.payload.clone()) {
            Ok(instance) => instance,
            Err(e) => return self.translate_failed(e, &loaded, started),
        };

        let previous = inner.state.current_version();
        inner.state.publish(Arc::new(instance), loaded.version.clone());

        tracing::info!(
            service = %inner.name,
            from = %previous,
            to = %loaded.version,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Service instance reloaded"
        );
        metrics::record_reload_outcome(&inner.name, ReloadOutcome::Published, started);
        Ok(true)
    }

    /// Run a reload on the runtime's worker pool without blocking the caller.
    pub fn reload_in_background(&self, force: bool) -> JoinHandle<Result<bool, ReloadError>> {
        let handle = self.clone();
        self.inner
            .runtime
            .spawn_reload(async move { handle.reload(force).await })
    }

    /// Evaluate registered actions in order. `false` means veto.
    async fn run_actions(&self) -> bool {
        let actions: Vec<Arc<dyn ReloadAction>> = self
            .inner
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if actions.is_empty() {
            return true;
        }

        let target = self.as_reloadable();
        for action in actions {
            match action.run(target.clone()).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(service = %self.inner.name, action = %action.describe(), "Action aborted reload");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(
                        service = %self.inner.name,
                        action = %action.describe(),
                        error = %e,
                        "Action failed, aborting reload"
                    );
                    return false;
                }
            }
        }
        true
    }

    fn source_failed(&self, error: SourceError, started: Instant) -> Result<bool, ReloadError> {
        metrics::record_reload_outcome(&self.inner.name, ReloadOutcome::SourceFailed, started);
        match &self.inner.error_handler {
            Some(handler) => {
                handler.on_source_failed(&error, self as &dyn Reloadable);
                Ok(false)
            }
            None => {
                tracing::warn!(service = %self.inner.name, error = %error, "Source failed");
                Err(ReloadError::Source(error))
            }
        }
    }

    fn translate_failed(
        &self,
        error: TranslateError,
        loaded: &LoadedResource,
        started: Instant,
    ) -> Result<bool, ReloadError> {
        metrics::record_reload_outcome(&self.inner.name, ReloadOutcome::TranslateFailed, started);
        match &self.inner.error_handler {
            Some(handler) => {
                handler.on_translate_failed(&error, loaded, self as &dyn Reloadable);
                Ok(false)
            }
            None => {
                tracing::warn!(service = %self.inner.name, error = %error, "Translation failed");
                Err(ReloadError::Translate(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AbortIf;
    use crate::config::schema::RuntimeConfig;
    use crate::runtime::ReloadRuntime;
    use crate::service::LoggingErrorHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::source::{MemorySource, Source};
    use crate::translate::Utf8;
    use crate::version::{ResourceId, Version};

    async fn text_service<S: Source + Clone + 'static>(source: &S, id: &ResourceId) -> ServiceHandle<String> {
        let runtime = ReloadRuntime::new(&RuntimeConfig::default()).unwrap();
        ServiceHandle::builder("text", id.clone())
            .source(source.clone())
            .translator(Utf8)
            .build(&runtime)
            .await
            .unwrap()
    }

    /// Memory source that counts every fetch.
    #[derive(Clone, Default)]
    struct CountingSource {
        data: MemorySource,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Source for CountingSource {
        async fn load_if_modified(
            &self,
            id: &ResourceId,
            version: &Version,
        ) -> Result<Option<LoadedResource>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.data.load_if_modified(id, version).await
        }

        async fn load(&self, id: &ResourceId) -> Result<LoadedResource, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.data.load(id).await
        }

        fn describe(&self) -> String {
            self.data.describe()
        }
    }

    #[tokio::test]
    async fn unchanged_resource_is_not_republished() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let service = text_service(&source, &id).await;

        assert_eq!(*service.current_instance(), "abc");
        assert!(!service.reload(false).await.unwrap());
        assert_eq!(*service.current_instance(), "abc");
        assert!(!service.is_reloading());
    }

    #[tokio::test]
    async fn changed_resource_is_published_with_its_version() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let service = text_service(&source, &id).await;

        let version = source.set(id.clone(), "def");
        assert!(service.reload(false).await.unwrap());
        let snap = service.snapshot();
        assert_eq!(*snap.instance, "def");
        assert_eq!(snap.version, version);
    }

    #[tokio::test]
    async fn in_flight_reload_skips_without_touching_source() {
        let id = ResourceId::named("greeting");
        let source = CountingSource::default();
        source.data.set(id.clone(), "abc");
        let service = text_service(&source, &id).await;
        source.data.set(id.clone(), "def");
        let fetches = source.fetches.load(Ordering::SeqCst);

        let guard = service.inner.state.try_begin_reload().unwrap();
        assert!(!service.reload(false).await.unwrap());
        assert_eq!(*service.current_instance(), "abc");
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches);
        drop(guard);

        assert!(service.reload(false).await.unwrap());
    }

    #[tokio::test]
    async fn forced_reload_loads_unconditionally() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let service = text_service(&source, &id).await;

        assert!(service.reload(true).await.unwrap());
        assert_eq!(*service.current_instance(), "abc");
    }

    #[tokio::test]
    async fn veto_keeps_instance_and_version() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let service = text_service(&source, &id).await;
        let before = service.current_version();
        service.add_action(AbortIf::new(|_| Ok(true)));

        source.set(id.clone(), "def");
        assert!(!service.reload(false).await.unwrap());
        assert_eq!(*service.current_instance(), "abc");
        assert_eq!(service.current_version(), before);
    }

    #[tokio::test]
    async fn failures_propagate_without_handler() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let service = text_service(&source, &id).await;

        source.set(id.clone(), vec![0xff, 0xfe]);
        let err = service.reload(false).await.unwrap_err();
        assert!(matches!(err, ReloadError::Translate(_)));

        source.remove(&id);
        let err = service.reload(false).await.unwrap_err();
        assert!(matches!(err, ReloadError::Source(SourceError::NotFound(_))));
        assert!(!service.is_reloading());
    }

    #[tokio::test]
    async fn handler_absorbs_failures() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let runtime = ReloadRuntime::new(&RuntimeConfig::default()).unwrap();
        let handler = Arc::new(LoggingErrorHandler::new());
        let service: ServiceHandle<String> = ServiceHandle::builder("text", id.clone())
            .source(source.clone())
            .translator(Utf8)
            .shared_error_handler(handler.clone())
            .build(&runtime)
            .await
            .unwrap();

        source.set(id.clone(), vec![0xff]);
        assert!(!service.reload(false).await.unwrap());
        assert_eq!(handler.translate_failures(), 1);
        assert_eq!(handler.source_failures(), 0);
        assert_eq!(service.current_version(), Version::Sequence(1));
    }

    #[tokio::test]
    async fn background_reload_resolves_on_the_pool() {
        let id = ResourceId::named("greeting");
        let source = MemorySource::with(id.clone(), "abc");
        let service = text_service(&source, &id).await;

        source.set(id.clone(), "xyz");
        assert!(service.reload_in_background(false).await.unwrap().unwrap());
        assert_eq!(*service.current_instance(), "xyz");
    }
}
