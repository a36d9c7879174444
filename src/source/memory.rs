//! In-process source.
//!
//! Holds resources in a concurrent map. Every `set` bumps a per-source
//! sequence number used as the version and notifies subscribers of that
//! resource. Useful for embedding applications that push configuration
//! themselves, and for tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::SourceError;
use crate::source::{ChangeCallback, LoadedResource, Source, Subscription};
use crate::version::{ResourceId, Version};

#[derive(Debug, Clone)]
struct Entry {
    payload: Vec<u8>,
    sequence: u64,
}

/// A listenable source backed by memory.
#[derive(Clone, Default)]
pub struct MemorySource {
    entries: Arc<DashMap<ResourceId, Entry>>,
    listeners: Arc<DashMap<u64, (ResourceId, ChangeCallback)>>,
    sequence: Arc<AtomicU64>,
    next_listener: Arc<AtomicU64>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source already holding one resource.
    pub fn with(id: ResourceId, payload: impl Into<Vec<u8>>) -> Self {
        let source = Self::new();
        source.set(id, payload);
        source
    }

    /// Store new contents and notify subscribers. Returns the new version.
    pub fn set(&self, id: ResourceId, payload: impl Into<Vec<u8>>) -> Version {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.insert(
            id.clone(),
            Entry {
                payload: payload.into(),
                sequence,
            },
        );
        tracing::debug!(resource = %id, sequence, "Memory resource updated");
        self.notify(&id);
        Version::Sequence(sequence)
    }

    pub fn remove(&self, id: &ResourceId) {
        self.entries.remove(id);
        self.notify(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, id: &ResourceId) {
        // Collect first so callbacks run without holding shard locks.
        let callbacks: Vec<ChangeCallback> = self
            .listeners
            .iter()
            .filter(|r| r.value().0 == *id)
            .map(|r| r.value().1.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn load_if_modified(
        &self,
        id: &ResourceId,
        version: &Version,
    ) -> Result<Option<LoadedResource>, SourceError> {
        let loaded = self.load(id).await?;
        match version {
            Version::Sequence(seen) if loaded.version == Version::Sequence(*seen) => Ok(None),
            _ => Ok(Some(loaded)),
        }
    }

    async fn load(&self, id: &ResourceId) -> Result<LoadedResource, SourceError> {
        let entry = self
            .entries
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        Ok(LoadedResource::new(
            entry.payload,
            Version::Sequence(entry.sequence),
            format!("memory:{}", id),
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
        let key = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(key, (id.clone(), on_change));

        let listeners = self.listeners.clone();
        Ok(Subscription::new(move || {
            listeners.remove(&key);
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
