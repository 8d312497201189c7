//! StateCache — refreshable in-memory view over the property namespace.
//!
//! When caching is enabled (the default), reads are served from the last
//! refreshed snapshot and writes go through to the store and the snapshot
//! together, keeping the view coherent. `refresh` atomically replaces the
//! snapshot with a fresh load from the store.
//!
//! When caching is disabled (`DISABLE_STATE_CACHE`), every read goes
//! direct to the store and `refresh` fails fast with a conflict — there
//! is no cache to refresh. The failure is deterministic and non-fatal.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::store::StateStore;

/// Property snapshot. BTreeMap keeps keys in the sorted order the
/// listing contract requires.
type Snapshot = BTreeMap<String, Vec<u8>>;

/// In-memory, refreshable cache over the store's property namespace.
pub struct StateCache {
    store: StateStore,
    enabled: bool,
    snapshot: RwLock<Snapshot>,
}

impl StateCache {
    /// Create a cache over the given store. When enabled, the snapshot is
    /// primed immediately so reads are serviceable before the first refresh.
    pub fn new(store: StateStore, enabled: bool) -> StateResult<Self> {
        let snapshot = if enabled { load_snapshot(&store)? } else { Snapshot::new() };
        debug!(enabled, entries = snapshot.len(), "state cache created");
        Ok(Self { store, enabled, snapshot: RwLock::new(snapshot) })
    }

    /// Whether caching is enabled. Toggling requires re-creating the
    /// cache (a scheduler re-registration); task identities are never
    /// affected by the toggle.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        if !self.enabled {
            return self.store.get_property(key);
        }
        Ok(self.snapshot.read().expect("cache lock poisoned").get(key).cloned())
    }

    /// All property keys in sorted order.
    pub fn keys(&self) -> StateResult<Vec<String>> {
        if !self.enabled {
            return self.store.list_property_keys();
        }
        Ok(self.snapshot.read().expect("cache lock poisoned").keys().cloned().collect())
    }

    /// Write a property through to the store, updating the snapshot so
    /// cached reads observe the write immediately.
    pub fn put(&self, key: &str, value: &[u8]) -> StateResult<()> {
        self.store.set_property(key, value)?;
        if self.enabled {
            self.snapshot
                .write()
                .expect("cache lock poisoned")
                .insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }

    /// Force a reload from the store, replacing the snapshot atomically.
    ///
    /// Fails with [`StateError::Conflict`] when caching is disabled; the
    /// prior (empty) snapshot is left intact and the process carries on.
    pub fn refresh(&self) -> StateResult<()> {
        if !self.enabled {
            return Err(StateError::Conflict(
                "state cache is disabled; nothing to refresh".to_string(),
            ));
        }
        let fresh = load_snapshot(&self.store)?;
        let mut snapshot = self.snapshot.write().expect("cache lock poisoned");
        *snapshot = fresh;
        info!(entries = snapshot.len(), "state cache refreshed");
        Ok(())
    }
}

fn load_snapshot(store: &StateStore) -> StateResult<Snapshot> {
    Ok(store.list_properties()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_props() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        store.set_property("hello-0-server:task-status", b"TASK_RUNNING").unwrap();
        store.set_property("last-completed-update-type", b"deploy").unwrap();
        store
    }

    #[test]
    fn enabled_cache_serves_primed_snapshot() {
        let cache = StateCache::new(store_with_props(), true).unwrap();
        assert_eq!(
            cache.get("last-completed-update-type").unwrap().as_deref(),
            Some(b"deploy".as_slice())
        );
        assert_eq!(
            cache.keys().unwrap(),
            vec!["hello-0-server:task-status", "last-completed-update-type"]
        );
    }

    #[test]
    fn enabled_cache_is_stale_until_refresh() {
        let store = store_with_props();
        let cache = StateCache::new(store.clone(), true).unwrap();

        // A write bypassing the cache is not yet visible...
        store.set_property("suppressed", b"true").unwrap();
        assert!(cache.get("suppressed").unwrap().is_none());

        // ...until refresh swaps in a fresh snapshot.
        cache.refresh().unwrap();
        assert_eq!(cache.get("suppressed").unwrap().as_deref(), Some(b"true".as_slice()));
    }

    #[test]
    fn write_through_is_immediately_visible() {
        let cache = StateCache::new(store_with_props(), true).unwrap();
        cache.put("world-0-server:task-status", b"TASK_RUNNING").unwrap();
        assert!(cache.get("world-0-server:task-status").unwrap().is_some());
    }

    #[test]
    fn disabled_cache_reads_through() {
        let store = store_with_props();
        let cache = StateCache::new(store.clone(), false).unwrap();

        // Reads hit the store directly; no staleness.
        store.set_property("suppressed", b"true").unwrap();
        assert_eq!(cache.get("suppressed").unwrap().as_deref(), Some(b"true".as_slice()));
        assert_eq!(cache.keys().unwrap().len(), 3);
    }

    #[test]
    fn disabled_cache_refresh_conflicts() {
        let cache = StateCache::new(store_with_props(), false).unwrap();
        let err = cache.refresh().unwrap_err();
        assert!(matches!(err, StateError::Conflict(_)));

        // The failure is non-fatal: reads keep working afterwards.
        assert!(cache.get("last-completed-update-type").unwrap().is_some());
    }

    #[test]
    fn keys_sorted_in_both_modes() {
        let store = StateStore::open_in_memory().unwrap();
        for key in ["zeta", "alpha", "mid"] {
            store.set_property(key, b"x").unwrap();
        }
        for enabled in [true, false] {
            let cache = StateCache::new(store.clone(), enabled).unwrap();
            assert_eq!(cache.keys().unwrap(), vec!["alpha", "mid", "zeta"]);
        }
    }
}
