//! Resource backends.
//!
//! # Data Flow
//! ```text
//! orchestrator
//!     → Source::load_if_modified(id, current_version)
//!         → None: unchanged, reload ends
//!         → Some(LoadedResource): bytes + new version
//!     → translator → factory → publish
//!
//! push-capable sources:
//!     Source::subscribe(id, callback) → Subscription
//!     backend change → callback() → listening loader
//! ```
//!
//! # Design Decisions
//! - Versions are opaque to the engine and handed back unchanged
//! - "Unchanged" is `Ok(None)`, never an error
//! - Push support is optional; callers check `is_listenable` first

pub mod file;
pub mod http;
pub mod memory;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::SourceError;
use crate::version::{ResourceId, Version};

pub use file::FileSource;
pub use http::HttpSource;
pub use memory::MemorySource;

/// Callback invoked by a source when the resource changed.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Result of a successful fetch. Consumed by a single reload attempt.
#[derive(Debug, Clone)]
pub struct LoadedResource {
    pub payload: Vec<u8>,
    pub version: Version,
    pub description: String,
}

impl LoadedResource {
    pub fn new(payload: impl Into<Vec<u8>>, version: Version, description: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            version,
            description: description.into(),
        }
    }
}

/// Backend contract consumed by the reload engine.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch the resource only if it differs from `version`.
    ///
    /// The default implementation loads unconditionally and compares the
    /// returned version.
    async fn load_if_modified(
        &self,
        id: &ResourceId,
        version: &Version,
    ) -> Result<Option<LoadedResource>, SourceError> {
        let loaded = self.load(id).await?;
        if !version.is_empty() && loaded.version == *version {
            return Ok(None);
        }
        Ok(Some(loaded))
    }

    /// Unconditional fetch.
    async fn load(&self, id: &ResourceId) -> Result<LoadedResource, SourceError>;

    fn is_listenable(&self) -> bool {
        false
    }

    /// Register for change notifications on `id`.
    fn subscribe(
        &self,
        _id: &ResourceId,
        _on_change: ChangeCallback,
    ) -> Result<Subscription, SourceError> {
        Err(SourceError::NotListenable(self.describe()))
    }

    /// Diagnostic label.
    fn describe(&self) -> String;
}

/// Cancellation handle for a push registration.
///
/// Unsubscribing is idempotent and also happens on drop.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Fixed;

    #[async_trait]
    impl Source for Fixed {
        async fn load(&self, _id: &ResourceId) -> Result<LoadedResource, SourceError> {
            Ok(LoadedResource::new("abc", Version::Sequence(1), "fixed"))
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    #[tokio::test]
    async fn default_conditional_load_compares_versions() {
        let id = ResourceId::named("x");
        assert!(Fixed.load_if_modified(&id, &Version::Empty).await.unwrap().is_some());
        assert!(Fixed
            .load_if_modified(&id, &Version::Sequence(1))
            .await
            .unwrap()
            .is_none());
        assert!(Fixed.subscribe(&id, Arc::new(|| {})).is_err());
    }
}
