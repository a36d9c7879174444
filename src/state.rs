//! Hot-swappable holder of the current instance.
//!
//! # Responsibilities
//! - Publish an (instance, version) pair as one unit
//! - Serve lock-free reads of the pair
//! - Track whether a reload is in flight
//!
//! The pair lives behind a single `ArcSwap`, so a reader loads one pointer
//! and can never see the instance of one reload next to the version of
//! another. Writers only swap the pointer; construction of the new instance
//! happens before `publish` is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::version::Version;

/// One published (instance, version) pair.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub instance: Arc<T>,
    pub version: Version,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            version: self.version.clone(),
        }
    }
}

/// Concurrency primitive behind every `ServiceHandle`.
#[derive(Debug)]
pub struct ServiceState<T> {
    current: ArcSwap<Snapshot<T>>,
    reloading: AtomicBool,
}

impl<T> ServiceState<T> {
    pub fn new(instance: T, version: Version) -> Self {
        Self::from_arc(Arc::new(instance), version)
    }

    pub fn from_arc(instance: Arc<T>, version: Version) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot { instance, version }),
            reloading: AtomicBool::new(false),
        }
    }

    pub fn current_instance(&self) -> Arc<T> {
        self.current.load().instance.clone()
    }

    pub fn current_version(&self) -> Version {
        self.current.load().version.clone()
    }

    /// Read instance and version together.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.current.load_full()
    }

    /// Install a new pair. Visible to every read that starts afterwards.
    pub fn publish(&self, instance: Arc<T>, version: Version) {
        self.current.store(Arc::new(Snapshot { instance, version }));
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading.load(Ordering::Acquire)
    }

    /// Advisory flag setter, for callers driving the flag by hand.
    pub fn mark_reloading(&self, reloading: bool) {
        self.reloading.store(reloading, Ordering::Release);
    }

    /// Claim the in-flight flag. Returns `None` if a reload already holds it.
    pub fn try_begin_reload(&self) -> Option<ReloadGuard<'_, T>> {
        self.reloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReloadGuard {
                state: self,
                owned: true,
            })
    }

    /// Set the in-flight flag regardless of its current value.
    ///
    /// The returned guard only clears the flag if this call was the one that
    /// raised it; a forced reload racing a natural one leaves clearing to the
    /// natural reload.
    pub fn force_begin_reload(&self) -> ReloadGuard<'_, T> {
        let was_reloading = self.reloading.swap(true, Ordering::AcqRel);
        ReloadGuard {
            state: self,
            owned: !was_reloading,
        }
    }
}

/// RAII guard that clears the in-flight flag on drop.
#[derive(Debug)]
pub struct ReloadGuard<'a, T> {
    state: &'a ServiceState<T>,
    owned: bool,
}

impl<T> Drop for ReloadGuard<'_, T> {
    fn drop(&mut self) {
        if self.owned {
            self.state.reloading.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn publish_replaces_pair() {
        let state = ServiceState::new("abc".to_string(), Version::Sequence(1));
        state.publish(Arc::new("def".to_string()), Version::Sequence(2));

        let snap = state.snapshot();
        assert_eq!(*snap.instance, "def");
        assert_eq!(snap.version, Version::Sequence(2));
    }

    #[test]
    fn guard_clears_flag_on_drop() {
        let state = ServiceState::new(0u32, Version::Empty);
        {
            let _guard = state.try_begin_reload().unwrap();
            assert!(state.is_reloading());
            assert!(state.try_begin_reload().is_none());
        }
        assert!(!state.is_reloading());
    }

    #[test]
    fn forced_guard_does_not_clear_foreign_flag() {
        let state = ServiceState::new(0u32, Version::Empty);
        let natural = state.try_begin_reload().unwrap();
        drop(state.force_begin_reload());
        assert!(state.is_reloading());
        drop(natural);
        assert!(!state.is_reloading());
    }

    #[test]
    fn manual_flag_blocks_natural_reloads() {
        let state = ServiceState::new(0u32, Version::Empty);
        state.mark_reloading(true);
        assert!(state.try_begin_reload().is_none());
        state.mark_reloading(false);
        assert!(state.try_begin_reload().is_some());
    }

    #[test]
    fn readers_never_see_mixed_pairs() {
        let state = Arc::new(ServiceState::new(0u64, Version::Sequence(0)));

        let writer = {
            let state = state.clone();
            thread::spawn(move || {
                for i in 1..=10_000u64 {
                    state.publish(Arc::new(i), Version::Sequence(i));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let snap = state.snapshot();
                        assert_eq!(snap.version, Version::Sequence(*snap.instance));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
