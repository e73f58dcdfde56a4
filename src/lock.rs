//! The per-name lock primitive.
//!
//! A lease *is* ownership of the entry's binary mutex. The mutex itself has
//! to be a [`tokio::sync::Mutex`] rather than `std::sync::Mutex`: the guard
//! is held across `.await` points for the lifetime of a connection's inner
//! loop, which only an async-aware mutex's `OwnedMutexGuard` can do safely.
//! Acquisition is always the non-blocking `try_lock_owned` — the mutex is
//! never awaited, matching the Python original's `threading.Lock.acquire(
//! blocking=False)`.
//!
//! Bookkeeping (`name`, `holder_id`, `last_update`) lives behind its own
//! `std::sync::Mutex` so the reaper and `.stats` can read it safely without
//! holding the lease; the *contract* that writers only touch it while
//! holding the lease is enforced by convention (only [`LockEntry::update`]
//! writes, and callers only call it post-grant), exactly as in
//! `original_source/tcpnetlock/server/lock.py`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OwnedMutexGuard;

/// An acquired lease on a [`LockEntry`]. Dropping it releases the lock.
pub type Lease = OwnedMutexGuard<()>;

struct Bookkeeping {
    name: Option<String>,
    holder_id: String,
    last_update: Instant,
}

pub struct LockEntry {
    mutex: Arc<tokio::sync::Mutex<()>>,
    bookkeeping: Mutex<Bookkeeping>,
}

impl LockEntry {
    /// A freshly created entry is never held.
    pub fn new() -> Arc<LockEntry> {
        Arc::new(LockEntry {
            mutex: Arc::new(tokio::sync::Mutex::new(())),
            bookkeeping: Mutex::new(Bookkeeping {
                name: None,
                holder_id: String::new(),
                last_update: Instant::now(),
            }),
        })
    }

    /// Non-blocking acquisition. Returns `None` if another holder already
    /// has the lease.
    pub fn try_acquire(&self) -> Option<Lease> {
        self.mutex.clone().try_lock_owned().ok()
    }

    /// Records the holder and refreshes the timestamp.
    ///
    /// Precondition: the caller holds the `Lease` returned by
    /// [`LockEntry::try_acquire`]. Reassigning `name` to something other
    /// than what was already recorded is a programmer error.
    pub fn update(&self, name: &str, holder_id: String) {
        let mut bk = self.bookkeeping.lock().unwrap();
        match bk.name.as_deref() {
            None => bk.name = Some(name.to_string()),
            Some(existing) => assert_eq!(
                existing, name,
                "lock entry name must not be reassigned once set"
            ),
        }
        bk.holder_id = holder_id;
        bk.last_update = Instant::now();
    }

    /// A non-authoritative snapshot: `true` means a holder was observed at
    /// some instant, but may have released immediately after. Only acted on
    /// by following up with `try_acquire`.
    pub fn is_locked(&self) -> bool {
        self.mutex.try_lock().is_err()
    }

    /// Seconds since the last [`LockEntry::update`].
    pub fn age(&self) -> Duration {
        let bk = self.bookkeeping.lock().unwrap();
        Instant::now().saturating_duration_since(bk.last_update)
    }

    pub fn holder_id(&self) -> String {
        self.bookkeeping.lock().unwrap().holder_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_unlocked() {
        let entry = LockEntry::new();
        assert!(!entry.is_locked());
    }

    #[test]
    fn try_acquire_excludes_concurrent_acquisition() {
        let entry = LockEntry::new();
        let lease = entry.try_acquire().expect("first acquire should succeed");
        assert!(entry.is_locked());
        assert!(entry.try_acquire().is_none());
        drop(lease);
        assert!(!entry.is_locked());
        assert!(entry.try_acquire().is_some());
    }

    #[test]
    fn update_refreshes_timestamp_and_holder() {
        let entry = LockEntry::new();
        let _lease = entry.try_acquire().unwrap();
        entry.update("alpha", "client-1".to_string());
        assert_eq!(entry.holder_id(), "client-1");
        assert!(entry.age() < Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "must not be reassigned")]
    fn reassigning_name_panics() {
        let entry = LockEntry::new();
        let _lease = entry.try_acquire().unwrap();
        entry.update("alpha", "client-1".to_string());
        entry.update("beta", "client-2".to_string());
    }
}
