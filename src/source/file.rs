//! Local file source with change notifications.
//!
//! Versions are file modification times. Push notifications come from a
//! `notify` watcher on the parent directory so that editors which replace
//! the file (write to temp, rename) are still observed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::SourceError;
use crate::source::{ChangeCallback, LoadedResource, Source, Subscription};
use crate::version::{ResourceId, Version};

/// Reads `ResourceId::Path` resources from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    poll_interval: Duration,
}

impl Default for FileSource {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll interval used by the watcher on platforms without native events.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn path<'a>(&self, id: &'a ResourceId) -> Result<&'a Path, SourceError> {
        match id {
            ResourceId::Path(p) => Ok(p.as_path()),
            other => Err(SourceError::UnsupportedResource {
                resource: other.to_string(),
                source_name: self.describe(),
            }),
        }
    }

    async fn modified(&self, path: &Path) -> Result<Version, SourceError> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| io_error(path, e))?;
        let mtime = meta.modified().map_err(|e| io_error(path, e))?;
        Ok(Version::Modified(DateTime::<Utc>::from(mtime)))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> SourceError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SourceError::NotFound(path.display().to_string())
    } else {
        SourceError::Io {
            resource: path.display().to_string(),
            source: err,
        }
    }
}

#[async_trait]
impl Source for FileSource {
    async fn load_if_modified(
        &self,
        id: &ResourceId,
        version: &Version,
    ) -> Result<Option<LoadedResource>, SourceError> {
        let path = self.path(id)?;
        if !version.is_empty() && self.modified(path).await? == *version {
            return Ok(None);
        }
        self.load(id).await.map(Some)
    }

    async fn load(&self, id: &ResourceId) -> Result<LoadedResource, SourceError> {
        let path = self.path(id)?;
        let version = self.modified(path).await?;
        let payload = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
        Ok(LoadedResource::new(
            payload,
            version,
            format!("file:{}", path.display()),
        ))
    }

    fn is_listenable(&self) -> bool {
        true
    }

    fn subscribe(
        &self,
        id: &ResourceId,
        on_change: ChangeCallback,
    ) -> Result<Subscription, SourceError> {
        let path = self.path(id)?.to_path_buf();
        let target: PathBuf = path.file_name().map(PathBuf::from).unwrap_or_default();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let watch_error = |source: notify::Error| SourceError::Watch {
            resource: path.display().to_string(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify()
                        || event.kind.is_create()
                        || event.kind.is_remove();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(Path::new) == Some(target.as_path()));
                    if relevant && ours {
                        tracing::debug!(paths = ?event.paths, "File change detected");
                        on_change();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(watch_error)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        tracing::info!(path = ?path, "File watcher started");
        Ok(Subscription::new(move || {
            drop(watcher);
            tracing::info!(path = ?path, "File watcher stopped");
        }))
    }

    fn describe(&self) -> String {
        "file".to_string()
    }
}
