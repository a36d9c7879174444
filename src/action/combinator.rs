//! Boolean composition of actions.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::action::ReloadAction;
use crate::error::ActionError;
use crate::service::Reloadable;

/// What a parallel combinator does with an action that errored or panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParallelFailurePolicy {
    /// Count the failed action as a negative result.
    #[default]
    TreatAsFalse,
    /// Fail the whole combinator with the first error.
    Propagate,
}

/// Left to right, stops at the first `false`. Empty is `true`.
pub struct All {
    actions: Vec<Arc<dyn ReloadAction>>,
}

/// Left to right, stops at the first `true`. Empty is `false`.
pub struct Any {
    actions: Vec<Arc<dyn ReloadAction>>,
}

pub fn all(actions: Vec<Arc<dyn ReloadAction>>) -> All {
    All { actions }
}

pub fn any(actions: Vec<Arc<dyn ReloadAction>>) -> Any {
    Any { actions }
}

#[async_trait]
impl ReloadAction for All {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        for action in &self.actions {
            if !action.run(target.clone()).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn describe(&self) -> String {
        format!("all({})", describe_each(&self.actions))
    }
}

#[async_trait]
impl ReloadAction for Any {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        for action in &self.actions {
            if action.run(target.clone()).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn describe(&self) -> String {
        format!("any({})", describe_each(&self.actions))
    }
}

/// Runs every action concurrently, then ANDs the results.
pub struct AllParallel {
    actions: Vec<Arc<dyn ReloadAction>>,
    policy: ParallelFailurePolicy,
}

/// Runs every action concurrently, then ORs the results.
pub struct AnyParallel {
    actions: Vec<Arc<dyn ReloadAction>>,
    policy: ParallelFailurePolicy,
}

pub fn all_parallel(actions: Vec<Arc<dyn ReloadAction>>) -> AllParallel {
    AllParallel {
        actions,
        policy: ParallelFailurePolicy::default(),
    }
}

pub fn any_parallel(actions: Vec<Arc<dyn ReloadAction>>) -> AnyParallel {
    AnyParallel {
        actions,
        policy: ParallelFailurePolicy::default(),
    }
}

impl AllParallel {
    pub fn with_policy(mut self, policy: ParallelFailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl AnyParallel {
    pub fn with_policy(mut self, policy: ParallelFailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Spawn all actions on the target's runtime and collect their verdicts.
async fn run_parallel(
    actions: &[Arc<dyn ReloadAction>],
    target: Arc<dyn Reloadable>,
    policy: ParallelFailurePolicy,
) -> Result<Vec<bool>, ActionError> {
    let tasks: Vec<_> = actions
        .iter()
        .map(|action| {
            let action = action.clone();
            let target = target.clone();
            let runtime = target.runtime().clone();
            runtime.spawn(async move { action.run(target).await })
        })
        .collect();

    let mut verdicts = Vec::with_capacity(tasks.len());
    for (joined, action) in join_all(tasks).await.into_iter().zip(actions) {
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(ActionError::Join(e.to_string())),
        };
        match result {
            Ok(verdict) => verdicts.push(verdict),
            Err(e) if policy == ParallelFailurePolicy::Propagate => return Err(e),
            Err(e) => {
                tracing::warn!(
                    service = %target.name(),
                    action = %action.describe(),
                    error = %e,
                    "Parallel action failed, counting as false"
                );
                verdicts.push(false);
            }
        }
    }
    Ok(verdicts)
}

#[async_trait]
impl ReloadAction for AllParallel {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        let verdicts = run_parallel(&self.actions, target, self.policy).await?;
        Ok(verdicts.into_iter().all(|v| v))
    }

    fn describe(&self) -> String {
        format!("all_parallel({})", describe_each(&self.actions))
    }
}

#[async_trait]
impl ReloadAction for AnyParallel {
    async fn run(&self, target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        let verdicts = run_parallel(&self.actions, target, self.policy).await?;
        Ok(verdicts.into_iter().any(|v| v))
    }

    fn describe(&self) -> String {
        format!("any_parallel({})", describe_each(&self.actions))
    }
}

fn describe_each(actions: &[Arc<dyn ReloadAction>]) -> String {
    actions
        .iter()
        .map(|a| a.describe())
        .collect::<Vec<_>>()
        .join(", ")
}
