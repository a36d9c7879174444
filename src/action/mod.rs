//! Reload actions.
//!
//! # Data Flow
//! ```text
//! orchestrator (resource changed)
//!     → for each registered action, in order:
//!         action.run(target = handle being reloaded)
//!             Ok(true)  → continue
//!             Ok(false) → abort reload
//!             Err(_)    → abort reload (logged)
//!     → publish
//! ```
//!
//! # Primitives
//! - `TriggerReload`: cascade a reload to another handle, detached or awaited
//! - `AbortIfVersionMatches`: compare the target's version with another handle's
//! - `AbortIf`: generic gate over the target
//!
//! # Combinators
//! - `all` / `any`: sequential, short-circuiting
//! - `all_parallel` / `any_parallel`: every action runs concurrently on the
//!   runtime, results combined once all finished

pub mod abort;
pub mod combinator;
pub mod trigger;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::service::Reloadable;

pub use abort::{AbortIf, AbortIfVersionMatches};
pub use combinator::{
    all, all_parallel, any, any_parallel, All, AllParallel, Any, AnyParallel,
    ParallelFailurePolicy,
};
pub use trigger::{TriggerMode, TriggerReload};

/// A gate or cascade evaluated before a reload is published.
#[async_trait]
pub trait ReloadAction: Send + Sync {
    /// `Ok(true)` lets the reload of `target` proceed.
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError>;

    /// Label used in logs.
    fn describe(&self) -> String {
        "reload action".to_string()
    }
}

#[async_trait]
impl<A: ReloadAction + ?Sized> ReloadAction for Arc<A> {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        (**self).run(target).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
