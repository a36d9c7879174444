//! Push-driven loader with retry and backoff.
//!
//! A notification starts a retry sequence: reload, and while nothing was
//! published, sleep and try again with growing delays until the policy's
//! total wait is used up. The subscription outlives an exhausted sequence.
//!
//! Notifications arriving while a sequence is active are folded into it,
//! since the active sequence keeps retrying until something is published.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::loader::{BackoffPolicy, LoaderHandle, LoaderShared};
use crate::observability::metrics;
use crate::runtime::LoaderInfo;
use crate::service::Reloadable;

pub struct ListeningLoader;

impl ListeningLoader {
    /// Subscribe to the service's source. Fails fast if the source cannot
    /// push notifications.
    pub fn start(
        service: Arc<dyn Reloadable>,
        backoff: BackoffPolicy,
    ) -> Result<LoaderHandle, ConfigurationError> {
        let source = service.source();
        if !source.is_listenable() {
            return Err(ConfigurationError::NotListenable {
                service: service.name().to_string(),
                source_name: source.describe(),
            });
        }

        let runtime = service.runtime().clone();
        let shutdown = runtime.subscribe_shutdown();
        let info = LoaderInfo {
            id: Uuid::new_v4(),
            kind: "listening",
            service: service.name().to_string(),
            schedule: format!("push from {}", source.describe()),
        };
        let (shared, stop) = LoaderShared::register(&runtime, info)?;

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let subscription = source
            .subscribe(
                service.resource(),
                Arc::new(move || {
                    let _ = notify_tx.send(());
                }),
            )
            .map_err(|e| {
                shared.stop();
                ConfigurationError::Subscribe {
                    service: service.name().to_string(),
                    reason: e.to_string(),
                }
            })?;
        shared.attach_subscription(subscription);

        tracing::info!(
            loader = %shared.info().id,
            service = %service.name(),
            resource = %service.resource(),
            max_total_wait = ?backoff.max_total_wait,
            "Listening loader started"
        );

        runtime.spawn(run(service, backoff, shared.clone(), notify_rx, stop, shutdown));
        Ok(LoaderHandle::new(shared))
    }
}

async fn run(
    service: Arc<dyn Reloadable>,
    backoff: BackoffPolicy,
    shared: Arc<LoaderShared>,
    mut notifications: mpsc::UnboundedReceiver<()>,
    mut stop: watch::Receiver<bool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let retrying = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            received = notifications.recv() => {
                if received.is_none() {
                    break;
                }
                // Collapse bursts (one save often yields several events).
                while notifications.try_recv().is_ok() {}
                on_notification(&service, &backoff, &shared, &retrying);
            }
            _ = stop.changed() => break,
            _ = shutdown.recv() => {
                shared.stop();
                break;
            }
        }
    }
}

fn on_notification(
    service: &Arc<dyn Reloadable>,
    backoff: &BackoffPolicy,
    shared: &Arc<LoaderShared>,
    retrying: &Arc<AtomicBool>,
) {
    if !shared.is_running() {
        return;
    }
    if service.is_reloading() {
        tracing::debug!(service = %service.name(), "Reload in progress, ignoring notification");
        return;
    }
    if retrying.swap(true, Ordering::AcqRel) {
        tracing::debug!(service = %service.name(), "Retry sequence active, folding notification into it");
        return;
    }

    tracing::debug!(service = %service.name(), "Change notification received");
    // The sequence sleeps between attempts, so it runs outside the pool and
    // takes a slot per attempt.
    let runtime = service.runtime().clone();
    runtime.spawn(reload_with_backoff(
        service.clone(),
        backoff.clone(),
        shared.clone(),
        retrying.clone(),
    ));
}

/// Clears the retry flag however the sequence ends.
struct RetrySequence(Arc<AtomicBool>);

impl Drop for RetrySequence {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn reload_with_backoff(
    service: Arc<dyn Reloadable>,
    backoff: BackoffPolicy,
    shared: Arc<LoaderShared>,
    retrying: Arc<AtomicBool>,
) {
    let _sequence = RetrySequence(retrying);
    let mut attempt: u32 = 1;
    let mut waited = Duration::ZERO;

    loop {
        let outcome = {
            let _slot = service.runtime().acquire_reload_slot().await;
            service.reload(false).await
        };
        match outcome {
            Ok(true) => {
                tracing::info!(service = %service.name(), attempt, "Reloaded after change notification");
                return;
            }
            Ok(false) => {
                tracing::debug!(service = %service.name(), attempt, "Nothing published after notification");
            }
            Err(e) => {
                tracing::warn!(service = %service.name(), attempt, error = %e, "Reload after notification failed");
            }
        }

        let Some(delay) = backoff.next_delay(attempt, waited) else {
            tracing::warn!(
                service = %service.name(),
                attempts = attempt,
                waited = ?waited,
                "Giving up on this notification, still subscribed"
            );
            return;
        };

        tracing::info!(service = %service.name(), attempt, delay = ?delay, "Retrying reload");
        tokio::time::sleep(delay).await;
        waited += delay;
        attempt += 1;

        if !shared.is_running() {
            tracing::debug!(service = %service.name(), "Loader stopped, abandoning retries");
            return;
        }
        metrics::record_listener_retry(service.name());
    }
}
