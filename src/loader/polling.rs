//! Clock-driven loader.
//!
//! Each tick either enqueues a non-forced reload on the runtime or, if the
//! previous tick's reload is still queued or running, is dropped. Skipped
//! ticks are not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::loader::{LoaderHandle, LoaderShared, ScheduleSpec};
use crate::runtime::LoaderInfo;
use crate::service::Reloadable;

pub struct PollingLoader;

impl PollingLoader {
    pub fn start(
        service: Arc<dyn Reloadable>,
        schedule: ScheduleSpec,
    ) -> Result<LoaderHandle, ConfigurationError> {
        let runtime = service.runtime().clone();
        let shutdown = runtime.subscribe_shutdown();
        let info = LoaderInfo {
            id: Uuid::new_v4(),
            kind: "polling",
            service: service.name().to_string(),
            schedule: schedule.to_string(),
        };
        let (shared, stop) = LoaderShared::register(&runtime, info)?;

        tracing::info!(
            loader = %shared.info().id,
            service = %service.name(),
            schedule = %schedule,
            "Polling loader started"
        );

        runtime.spawn(run(service, schedule, shared.clone(), stop, shutdown));
        Ok(LoaderHandle::new(shared))
    }
}

async fn run(
    service: Arc<dyn Reloadable>,
    schedule: ScheduleSpec,
    shared: Arc<LoaderShared>,
    mut stop: watch::Receiver<bool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let pending = Arc::new(AtomicBool::new(false));
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let Some((delay, fires_at)) = schedule.next_tick(Utc::now(), last_fired) else {
            tracing::info!(service = %service.name(), "Schedule has no further ticks");
            shared.stop();
            break;
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
            _ = shutdown.recv() => {
                shared.stop();
                break;
            }
        }

        if fires_at.is_some() {
            last_fired = fires_at;
        }
        if !shared.is_running() {
            break;
        }
        tick(&service, &pending);
    }
}

/// Clears the loader's pending flag when its reload task ends.
struct PendingTick(Arc<AtomicBool>);

impl Drop for PendingTick {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// `pending` covers the whole life of the spawned task, including the wait
/// for a pool slot, so at most one tick per loader is ever queued.
fn tick(service: &Arc<dyn Reloadable>, pending: &Arc<AtomicBool>) {
    if service.is_reloading() {
        tracing::debug!(service = %service.name(), "Previous reload still running, skipping tick");
        return;
    }
    if pending
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        tracing::debug!(service = %service.name(), "Previous tick still queued, skipping tick");
        return;
    }

    let guard = PendingTick(pending.clone());
    let service = service.clone();
    let runtime = service.runtime().clone();
    runtime.spawn_reload(async move {
        let _guard = guard;
        match service.reload(false).await {
            Ok(true) => tracing::debug!(service = %service.name(), "Poll published a new instance"),
            Ok(false) => tracing::trace!(service = %service.name(), "Poll found nothing to publish"),
            Err(e) => tracing::warn!(service = %service.name(), error = %e, "Poll reload failed"),
        }
    });
}
