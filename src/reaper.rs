//! Background garbage collection of idle, unlocked registry entries.
//!
//! Grounded in `original_source/tcpnetlock/server/background_thread.py`'s
//! `BackgroundThread`: loop forever, sleep `iteration_wait` between sweeps,
//! skip anything locked or younger than `min_age`, and only ever delete
//! while momentarily holding the entry's own lease (proof that nothing
//! holds it). The registry mutex and an entry's mutex are never held at the
//! same time.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::registry::Registry;

/// Defaults mirror the Python original's `BackgroundThread` class
/// attributes.
pub const DEFAULT_ITERATION_WAIT: Duration = Duration::from_secs(5);
pub const DEFAULT_MIN_AGE: Duration = Duration::from_secs(5);

pub struct Reaper {
    iteration_wait: Duration,
    min_age: Duration,
}

impl Default for Reaper {
    fn default() -> Reaper {
        Reaper {
            iteration_wait: DEFAULT_ITERATION_WAIT,
            min_age: DEFAULT_MIN_AGE,
        }
    }
}

impl Reaper {
    pub fn new(iteration_wait: Duration, min_age: Duration) -> Reaper {
        Reaper {
            iteration_wait,
            min_age,
        }
    }

    /// Spawns the reaper as a background task. The returned handle is
    /// abort-on-drop from the caller's perspective: the server aborts it on
    /// graceful shutdown; in production it is daemon-scheduled and simply
    /// dies with the process.
    pub fn spawn(self, registry: Arc<Registry>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.iteration_wait).await;
                self.sweep(&registry);
            }
        })
    }

    /// Runs one sweep immediately, without waiting for `iteration_wait`.
    /// Exposed for tests driving the reaper deterministically.
    pub fn sweep(&self, registry: &Registry) {
        tracing::debug!("reaper: sweep starting");
        for key in registry.snapshot_keys() {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.check_key(registry, &key)));
            if outcome.is_err() {
                tracing::error!(key = %key, "reaper: exception while checking lock entry");
            }
        }
        tracing::debug!("reaper: sweep finished");
    }

    fn check_key(&self, registry: &Registry, key: &str) {
        let entry = match registry.get(key) {
            Some(entry) => entry,
            // Raced with a concurrent delete; nothing left to do.
            None => return,
        };

        if entry.is_locked() {
            return;
        }
        if entry.age() < self.min_age {
            return;
        }

        match entry.try_acquire() {
            // Another acquirer won the race; leave it alone.
            None => {}
            Some(lease) => {
                tracing::info!(key = %key, "reaper: removing idle lock entry");
                registry.delete(key);
                drop(lease);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_entries_are_skipped() {
        let registry = Registry::new();
        let entry = registry.get_or_create("alpha");
        let _lease = entry.try_acquire().unwrap();
        entry.update("alpha", String::new());

        let reaper = Reaper::new(Duration::from_secs(5), Duration::from_secs(0));
        reaper.check_key(&registry, "alpha");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn young_unlocked_entries_are_skipped() {
        let registry = Registry::new();
        let entry = registry.get_or_create("alpha");
        let lease = entry.try_acquire().unwrap();
        entry.update("alpha", String::new());
        drop(lease);

        let reaper = Reaper::new(Duration::from_secs(5), Duration::from_secs(600));
        reaper.check_key(&registry, "alpha");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn old_unlocked_entries_are_removed() {
        let registry = Registry::new();
        let entry = registry.get_or_create("alpha");
        let lease = entry.try_acquire().unwrap();
        entry.update("alpha", String::new());
        drop(lease);

        let reaper = Reaper::new(Duration::from_secs(5), Duration::from_secs(0));
        reaper.check_key(&registry, "alpha");
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_key_is_a_no_op() {
        let registry = Registry::new();
        let reaper = Reaper::default();
        reaper.check_key(&registry, "ghost");
        assert!(registry.is_empty());
    }
}
