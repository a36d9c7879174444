//! Gating actions.
//!
//! Both gates fail open: if the predicate cannot decide, the reload
//! proceeds.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use crate::action::ReloadAction;
use crate::error::ActionError;
use crate::service::Reloadable;
use crate::version::Version;

type VersionPredicate = dyn Fn(&Version, &Version) -> Result<bool, ActionError> + Send + Sync;

/// Abort when the target's version relates to another handle's version in
/// the way `predicate` describes.
///
/// The predicate receives `(target version, other version)`.
pub struct AbortIfVersionMatches {
    other: Arc<dyn Reloadable>,
    predicate: Box<VersionPredicate>,
    label: &'static str,
}

impl AbortIfVersionMatches {
    pub fn new<F>(other: Arc<dyn Reloadable>, predicate: F) -> Self
    where
        F: Fn(&Version, &Version) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        Self {
            other,
            predicate: Box::new(predicate),
            label: "custom",
        }
    }

    /// Abort while both handles hold the same version.
    pub fn same(other: Arc<dyn Reloadable>) -> Self {
        Self {
            label: "same",
            ..Self::new(other, |a, b| Ok(a == b))
        }
    }

    /// Abort while the target is older than the other handle.
    pub fn older(other: Arc<dyn Reloadable>) -> Self {
        Self {
            label: "older",
            ..Self::new(other, |a, b| Ok(compare(a, b)? == Ordering::Less))
        }
    }

    /// Abort while the target is newer than the other handle.
    pub fn newer(other: Arc<dyn Reloadable>) -> Self {
        Self {
            label: "newer",
            ..Self::new(other, |a, b| Ok(compare(a, b)? == Ordering::Greater))
        }
    }
}

fn compare(a: &Version, b: &Version) -> Result<Ordering, ActionError> {
    a.partial_cmp(b).ok_or_else(|| ActionError::Incomparable {
        left: a.to_string(),
        right: b.to_string(),
    })
}

#[async_trait]
impl ReloadAction for AbortIfVersionMatches {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        let mine = target.current_version();
        let theirs = self.other.current_version();
        match (self.predicate)(&mine, &theirs) {
            Ok(matched) => Ok(!matched),
            Err(e) => {
                tracing::debug!(
                    service = %target.name(),
                    other = %self.other.name(),
                    error = %e,
                    "Version comparison failed, not aborting"
                );
                Ok(true)
            }
        }
    }

    fn describe(&self) -> String {
        format!("abort if version {} as {}", self.label, self.other.name())
    }
}

type TargetPredicate = dyn Fn(&dyn Reloadable) -> Result<bool, ActionError> + Send + Sync;

/// Abort when `predicate` holds for the target.
pub struct AbortIf {
    predicate: Box<TargetPredicate>,
}

impl AbortIf {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Reloadable) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

#[async_trait]
impl ReloadAction for AbortIf {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        match (self.predicate)(target.as_ref()) {
            Ok(abort) => Ok(!abort),
            Err(e) => {
                tracing::debug!(service = %target.name(), error = %e, "Abort predicate failed, not aborting");
                Ok(true)
            }
        }
    }

    fn describe(&self) -> String {
        "abort if".to_string()
    }
}
