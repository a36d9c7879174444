//! Cascading reloads across handles.

use std::sync::Arc;

use async_trait::async_trait;

use crate::action::ReloadAction;
use crate::error::ActionError;
use crate::service::Reloadable;

/// How a cascaded reload relates to the reload that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Fire and forget on the runtime; the triggering reload always proceeds.
    Detached,
    /// Await the cascaded reload; the triggering reload proceeds only if it
    /// published.
    Wait,
}

/// Reload another handle whenever the target reloads.
pub struct TriggerReload {
    other: Arc<dyn Reloadable>,
    mode: TriggerMode,
    force: bool,
}

impl TriggerReload {
    pub fn new(other: Arc<dyn Reloadable>, mode: TriggerMode) -> Self {
        Self {
            other,
            mode,
            force: false,
        }
    }

    pub fn detached(other: Arc<dyn Reloadable>) -> Self {
        Self::new(other, TriggerMode::Detached)
    }

    pub fn and_wait(other: Arc<dyn Reloadable>) -> Self {
        Self::new(other, TriggerMode::Wait)
    }

    /// Bypass the other handle's change detection and in-flight guard.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

#[async_trait]
impl ReloadAction for TriggerReload {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        let force = self.force;
        match self.mode {
            TriggerMode::Detached => {
                let other = self.other.clone();
                let trigger = target.name().to_string();
                self.other.runtime().spawn_reload(async move {
                    match other.reload(force).await {
                        Ok(reloaded) => tracing::debug!(
                            service = %other.name(),
                            trigger = %trigger,
                            reloaded,
                            "Cascaded reload finished"
                        ),
                        Err(e) => tracing::warn!(
                            service = %other.name(),
                            trigger = %trigger,
                            error = %e,
                            "Cascaded reload failed"
                        ),
                    }
                });
                Ok(true)
            }
            TriggerMode::Wait => {
                let reloaded = self
                    .other
                    .reload(force)
                    .await
                    .map_err(|e| ActionError::Cascade {
                        service: self.other.name().to_string(),
                        source: Box::new(e),
                    })?;
                tracing::debug!(
                    service = %self.other.name(),
                    trigger = %target.name(),
                    reloaded,
                    "Cascaded reload awaited"
                );
                Ok(reloaded)
            }
        }
    }

    fn describe(&self) -> String {
        match self.mode {
            TriggerMode::Detached => format!("trigger reload of {}", self.other.name()),
            TriggerMode::Wait => format!("trigger and wait reload of {}", self.other.name()),
        }
    }
}
