//! StateStore — redb-backed coordination store for the scheduler.
//!
//! Provides typed access to configuration versions, the `ConfigTarget`
//! pointer, the flat property namespace, task records, persisted plans,
//! and the leadership lock node. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe coordination store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "coordination store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory coordination store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        txn.open_table(PROPERTIES).map_err(map_err!(Table))?;
        txn.open_table(TASKS).map_err(map_err!(Table))?;
        txn.open_table(PLANS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Configuration versions ─────────────────────────────────────

    /// Persist a configuration version. History is retained.
    pub fn put_config(&self, record: &ConfigRecord) -> StateResult<()> {
        let key = record.id.to_string();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "config version stored");
        Ok(())
    }

    /// Get a configuration version by id.
    pub fn get_config(&self, id: Uuid) -> StateResult<Option<ConfigRecord>> {
        let key = id.to_string();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ConfigRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all persisted configuration version ids, in key order.
    pub fn list_config_ids(&self) -> StateResult<Vec<Uuid>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let id = key
                .value()
                .parse()
                .map_err(|_| StateError::Deserialize(format!("bad config key {:?}", key.value())))?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Point `ConfigTarget` at a configuration version.
    pub fn set_target_id(&self, id: Uuid) -> StateResult<()> {
        self.put_meta(META_CONFIG_TARGET, id.to_string().as_bytes())?;
        debug!(%id, "config target updated");
        Ok(())
    }

    /// The current target configuration id, if any.
    pub fn target_id(&self) -> StateResult<Option<Uuid>> {
        match self.get_meta(META_CONFIG_TARGET)? {
            Some(bytes) => {
                let s = String::from_utf8(bytes).map_err(map_err!(Deserialize))?;
                let id = s
                    .parse()
                    .map_err(|_| StateError::Deserialize(format!("bad target id {s:?}")))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// The current target configuration record, if any.
    pub fn target(&self) -> StateResult<Option<ConfigRecord>> {
        match self.target_id()? {
            Some(id) => self.get_config(id),
            None => Ok(None),
        }
    }

    /// Raw bytes of the `ConfigTarget` node, for exact-content comparison.
    pub fn target_bytes(&self) -> StateResult<Option<Vec<u8>>> {
        self.get_meta(META_CONFIG_TARGET)
    }

    // ── Properties ─────────────────────────────────────────────────

    /// Set a property value.
    pub fn set_property(&self, key: &str, value: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PROPERTIES).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a property value.
    pub fn get_property(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROPERTIES).map_err(map_err!(Table))?;
        Ok(table
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec()))
    }

    /// All property keys in sorted order.
    ///
    /// redb iterates `&str` keys lexicographically, which is exactly the
    /// order the property listing contract requires.
    pub fn list_property_keys(&self) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROPERTIES).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    /// All properties as (key, value) pairs in sorted key order.
    pub fn list_properties(&self) -> StateResult<Vec<(String, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROPERTIES).map_err(map_err!(Table))?;
        let mut entries = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            entries.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(entries)
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Insert or update a task record.
    pub fn put_task(&self, task: &TaskRecord) -> StateResult<()> {
        let value = serde_json::to_vec(task).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            table
                .insert(task.table_key(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the task backing a pod instance.
    pub fn get_task(&self, instance: &str) -> StateResult<Option<TaskRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        match table.get(instance).map_err(map_err!(Read))? {
            Some(guard) => {
                let task: TaskRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// List all task records.
    pub fn list_tasks(&self) -> StateResult<Vec<TaskRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        let mut tasks = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let task: TaskRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Delete the task for a pod instance. Returns true if it existed.
    ///
    /// The task's `:task-status` property is deliberately left behind;
    /// decommissioned instances keep their property trail.
    pub fn delete_task(&self, instance: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            existed = table.remove(instance).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%instance, existed, "task deleted");
        Ok(existed)
    }

    // ── Plans ──────────────────────────────────────────────────────

    /// Persist a serialized plan tree under its name.
    pub fn put_plan(&self, name: &str, json: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            table.insert(name, json).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a serialized plan tree by name.
    pub fn get_plan(&self, name: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PLANS).map_err(map_err!(Table))?;
        Ok(table
            .get(name)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec()))
    }

    /// Delete a persisted plan. Returns true if it existed.
    pub fn delete_plan(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// List persisted plan names in key order.
    pub fn list_plan_names(&self) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PLANS).map_err(map_err!(Table))?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    // ── Framework id ───────────────────────────────────────────────

    /// Persist the framework id assigned at registration.
    pub fn set_framework_id(&self, id: Uuid) -> StateResult<()> {
        self.put_meta(META_FRAMEWORK_ID, id.to_string().as_bytes())
    }

    /// The registered framework id, if any.
    pub fn framework_id(&self) -> StateResult<Option<Uuid>> {
        match self.get_meta(META_FRAMEWORK_ID)? {
            Some(bytes) => {
                let s = String::from_utf8(bytes).map_err(map_err!(Deserialize))?;
                let id = s
                    .parse()
                    .map_err(|_| StateError::Deserialize(format!("bad framework id {s:?}")))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    // ── Leadership lock node ───────────────────────────────────────

    /// Acquire the leadership lock for a service, writing the lock node
    /// iff it is absent. Re-acquiring with the same owner succeeds.
    ///
    /// The check-and-write happens inside a single write transaction, so
    /// two racing instances cannot both acquire.
    pub fn try_acquire_lock(&self, service: &str, owner: Uuid) -> StateResult<()> {
        let key = lock_key(service);
        let value = owner.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(META).map_err(map_err!(Table))?;
            if let Some(guard) = table.get(key.as_str()).map_err(map_err!(Read))? {
                let held = String::from_utf8(guard.value().to_vec())
                    .map_err(map_err!(Deserialize))?;
                let holder: Uuid = held
                    .parse()
                    .map_err(|_| StateError::Deserialize(format!("bad lock owner {held:?}")))?;
                if holder != owner {
                    // Abort without writing anything.
                    return Err(StateError::LockContended {
                        service: service.to_string(),
                        holder,
                    });
                }
            }
            table
                .insert(key.as_str(), value.as_bytes())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Release the leadership lock if (and only if) `owner` holds it.
    /// Returns true if the lock node was removed.
    pub fn release_lock(&self, service: &str, owner: Uuid) -> StateResult<bool> {
        let key = lock_key(service);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let released;
        {
            let mut table = txn.open_table(META).map_err(map_err!(Table))?;
            let held_by_owner = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => guard.value() == owner.to_string().as_bytes(),
                None => false,
            };
            released = held_by_owner
                && table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(released)
    }

    /// The current lock holder for a service, if any.
    pub fn lock_holder(&self, service: &str) -> StateResult<Option<Uuid>> {
        match self.get_meta(&lock_key(service))? {
            Some(bytes) => {
                let s = String::from_utf8(bytes).map_err(map_err!(Deserialize))?;
                let id = s
                    .parse()
                    .map_err(|_| StateError::Deserialize(format!("bad lock owner {s:?}")))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn put_meta(&self, key: &str, value: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(META).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(META).map_err(map_err!(Table))?;
        Ok(table
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec()))
    }
}
