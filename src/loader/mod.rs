//! Scheduling loaders.
//!
//! # State Machine
//! ```text
//! Running → Stopped   (stop(), drop of the LoaderHandle, or runtime shutdown)
//! ```
//! A stopped loader is terminal; start a new one to resume.
//!
//! # Data Flow
//! ```text
//! polling.rs:   clock tick → skip if reloading or queued → spawn reload on runtime
//! listening.rs: source callback → channel → skip if reloading
//!                   → spawn retry sequence, one reload slot per attempt
//! ```
//!
//! # Design Decisions
//! - Ticks and notifications never run reload logic inline
//! - Every start returns a `LoaderHandle`; dropping it stops the loader
//! - Stopping prevents future ticks but never interrupts a running reload

pub mod listening;
pub mod polling;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::ConfigurationError;
use crate::runtime::{LoaderId, LoaderInfo, ReloadRuntime};
use crate::source::Subscription;

pub use crate::resilience::BackoffPolicy;
pub use listening::ListeningLoader;
pub use polling::PollingLoader;

/// When a polling loader fires.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    Interval(Duration),
    Cron {
        expression: String,
        schedule: Box<cron::Schedule>,
    },
}

impl ScheduleSpec {
    pub fn interval(period: Duration) -> Result<Self, ConfigurationError> {
        if period.is_zero() {
            return Err(ConfigurationError::ZeroInterval);
        }
        Ok(ScheduleSpec::Interval(period))
    }

    /// Parse a cron expression (seconds field first, evaluated in UTC).
    pub fn cron(expression: &str) -> Result<Self, ConfigurationError> {
        cron::Schedule::from_str(expression)
            .map(|schedule| ScheduleSpec::Cron {
                expression: expression.to_string(),
                schedule: Box::new(schedule),
            })
            .map_err(|e| ConfigurationError::InvalidCron {
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }

    /// Time from `now` until the next tick.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_tick(now, None).map(|(delay, _)| delay)
    }

    /// Delay until the next tick, plus the wall-clock instant it stands for
    /// (cron only).
    ///
    /// A cron tick is searched after the later of `now` and `last_fired`.
    /// The timer wakes on the monotonic clock, so the wall clock may still
    /// read just before the instant that was due; starting from
    /// `last_fired` keeps that instant from matching twice.
    pub fn next_tick(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
    ) -> Option<(Duration, Option<DateTime<Utc>>)> {
        match self {
            ScheduleSpec::Interval(period) => Some((*period, None)),
            ScheduleSpec::Cron { schedule, .. } => {
                let from = last_fired.map_or(now, |last| last.max(now));
                schedule.after(&from).next().map(|next| {
                    let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                    (delay, Some(next))
                })
            }
        }
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleSpec::Interval(period) => write!(f, "every {:?}", period),
            ScheduleSpec::Cron { expression, .. } => write!(f, "cron {}", expression),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Running = 1,
    Stopped = 2,
}

impl From<u8> for LoaderState {
    fn from(val: u8) -> Self {
        match val {
            1 => LoaderState::Running,
            _ => LoaderState::Stopped,
        }
    }
}

/// State shared between a `LoaderHandle` and its background task.
pub(crate) struct LoaderShared {
    info: LoaderInfo,
    state: AtomicU8,
    stop_tx: watch::Sender<bool>,
    subscription: Mutex<Option<Subscription>>,
    runtime: ReloadRuntime,
}

impl LoaderShared {
    /// Register a new running loader with `runtime`.
    pub(crate) fn register(
        runtime: &ReloadRuntime,
        info: LoaderInfo,
    ) -> Result<(Arc<Self>, watch::Receiver<bool>), ConfigurationError> {
        runtime.register_loader(info.clone())?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::new(Self {
            info,
            state: AtomicU8::new(LoaderState::Running as u8),
            stop_tx,
            subscription: Mutex::new(None),
            runtime: runtime.clone(),
        });
        Ok((shared, stop_rx))
    }

    pub(crate) fn attach_subscription(&self, subscription: Subscription) {
        let mut slot = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            *slot = Some(subscription);
        } else {
            subscription.unsubscribe();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == LoaderState::Running
    }

    pub(crate) fn state(&self) -> LoaderState {
        LoaderState::from(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn info(&self) -> &LoaderInfo {
        &self.info
    }

    /// Transition to `Stopped`. Returns `false` if already stopped.
    pub(crate) fn stop(&self) -> bool {
        let previous = self.state.swap(LoaderState::Stopped as u8, Ordering::AcqRel);
        if LoaderState::from(previous) == LoaderState::Stopped {
            return false;
        }

        let _ = self.stop_tx.send(true);
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        self.runtime.deregister_loader(&self.info.id);

        tracing::info!(
            loader = %self.info.id,
            kind = self.info.kind,
            service = %self.info.service,
            "Loader stopped"
        );
        true
    }
}

/// Cancellation handle returned by every loader start.
///
/// Dropping the handle stops the loader.
pub struct LoaderHandle {
    shared: Arc<LoaderShared>,
}

impl LoaderHandle {
    pub(crate) fn new(shared: Arc<LoaderShared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> LoaderId {
        self.shared.info().id
    }

    pub fn state(&self) -> LoaderState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Stop the loader. Safe to call more than once.
    pub fn stop(&self) {
        self.shared.stop();
    }
}

impl fmt::Debug for LoaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderHandle")
            .field("info", self.shared.info())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}
