//! Pluggable reload failure handling.
//!
//! When a handle has an `ErrorHandler`, runtime failures are reported to it
//! and the reload resolves to `Ok(false)`. Without one, they propagate to
//! the caller as `ReloadError`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{SourceError, TranslateError};
use crate::service::Reloadable;
use crate::source::LoadedResource;

pub trait ErrorHandler: Send + Sync {
    /// The source could not be read.
    fn on_source_failed(&self, error: &SourceError, service: &dyn Reloadable);

    /// The payload could not be translated or the factory failed.
    fn on_translate_failed(
        &self,
        error: &TranslateError,
        resource: &LoadedResource,
        service: &dyn Reloadable,
    );
}

/// Logs every failure and keeps counts of them.
#[derive(Debug, Default)]
pub struct LoggingErrorHandler {
    source_failures: AtomicU64,
    translate_failures: AtomicU64,
}

impl LoggingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_failures(&self) -> u64 {
        self.source_failures.load(Ordering::Relaxed)
    }

    pub fn translate_failures(&self) -> u64 {
        self.translate_failures.load(Ordering::Relaxed)
    }
}

impl ErrorHandler for LoggingErrorHandler {
    fn on_source_failed(&self, error: &SourceError, service: &dyn Reloadable) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            service = %service.name(),
            resource = %service.resource(),
            error = %error,
            "Failed to load resource. Keeping current instance."
        );
    }

    fn on_translate_failed(
        &self,
        error: &TranslateError,
        resource: &LoadedResource,
        service: &dyn Reloadable,
    ) {
        self.translate_failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            service = %service.name(),
            resource = %resource.description,
            version = %resource.version,
            bytes = resource.payload.len(),
            error = %error,
            "Failed to translate resource. Keeping current instance."
        );
    }
}
