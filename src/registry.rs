//! Name -> [`LockEntry`] registry.
//!
//! All insertion, lookup, and deletion is linearized by a single registry
//! mutex distinct from any entry's own mutex, grounded in
//! `original_source/tcpnetlock/server/context.py`'s `Context` (a
//! `threading.Lock` guarding a `defaultdict(Lock)`). The Python original
//! creates entries implicitly on indexing; here creation is the explicit
//! `get_or_create`, so the reaper's lookups can never accidentally
//! resurrect a just-deleted key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::lock::LockEntry;

#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, Arc<LockEntry>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the entry for `name`, creating a fresh (unlocked) one if
    /// absent. Never blocks on an entry's own mutex.
    pub fn get_or_create(&self, name: &str) -> Arc<LockEntry> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(name.to_string())
            .or_insert_with(LockEntry::new)
            .clone()
    }

    /// Removes `name` from the registry. The caller must already hold the
    /// entry's lease (proving it is reclaimable) before calling this.
    pub fn delete(&self, name: &str) {
        self.entries.lock().unwrap().remove(name);
    }

    /// A point-in-time copy of the current keys, for the reaper to sweep
    /// over without holding the registry mutex for the whole sweep.
    pub fn snapshot_keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// Looks up an entry without creating one. Used by the reaper, which
    /// must tolerate a key disappearing between snapshot and lookup.
    pub fn get(&self, name: &str) -> Option<Arc<LockEntry>> {
        self.entries.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent_for_the_same_name() {
        let registry = Registry::new();
        let a = registry.get_or_create("alpha");
        let b = registry.get_or_create("alpha");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn delete_removes_the_entry() {
        let registry = Registry::new();
        registry.get_or_create("alpha");
        assert_eq!(registry.len(), 1);
        registry.delete("alpha");
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_keys_reflects_current_state() {
        let registry = Registry::new();
        registry.get_or_create("alpha");
        registry.get_or_create("beta");
        let mut keys = registry.snapshot_keys();
        keys.sort();
        assert_eq!(keys, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn get_on_missing_key_returns_none() {
        let registry = Registry::new();
        assert!(registry.get("ghost").is_none());
    }
}
