//! `TypedStore` — typed reads from RAM, writes forwarded to the core.

use std::path::Path;

use parking_lot::RwLock;
use tracing::warn;

use driftkv_core::{Config, Store, StoreResult};

use crate::value::{StoredValue, TypedMaps};

/// Typed key-value store over a DriftKV core `Store`.
///
/// Reads are served from per-type maps and never touch the core. Writes
/// update the maps first, then queue the change with the core, under the
/// same lock so the queue order matches the map order.
pub struct TypedStore {
    core: Store,
    maps: RwLock<TypedMaps>,
}

impl TypedStore {
    /// Open the core store at `path` and index its startup snapshot.
    ///
    /// Records whose text does not parse as their type are skipped with a
    /// warning; they stay in the core until overwritten or deleted.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        let (core, entries) = Store::open(path, config)?;

        let mut maps = TypedMaps::default();
        for entry in &entries {
            if !maps.insert_text(&entry.key, entry.value_type, &entry.value) {
                warn!(
                    key = %entry.key,
                    value_type = %entry.value_type,
                    "skipping value that does not parse as its type"
                );
            }
        }

        Ok(Self { core, maps: RwLock::new(maps) })
    }

    pub fn get<T: StoredValue>(&self, key: &str) -> Option<T> {
        T::map(&self.maps.read()).get(key).cloned()
    }

    pub fn get_or<T: StoredValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn contains<T: StoredValue>(&self, key: &str) -> bool {
        T::map(&self.maps.read()).contains_key(key)
    }

    /// Keys holding a value of type `T`, sorted.
    pub fn keys<T: StoredValue>(&self) -> Vec<String> {
        let mut keys: Vec<String> = T::map(&self.maps.read()).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Set the value; visible to `get` at once, persisted by the next flush.
    ///
    /// Returns false, leaving the maps untouched, when the core rejects the
    /// key (a `|` or line break in it).
    pub fn set<T: StoredValue>(&self, key: &str, value: T) -> bool {
        let mut maps = self.maps.write();
        let text = value.to_text();
        if !self.core.set(key, T::VALUE_TYPE, &text) {
            return false;
        }
        T::map_mut(&mut maps).insert(key.to_string(), value);
        true
    }

    /// Remove the `T` value under `key`. Returns true if one existed.
    pub fn delete<T: StoredValue>(&self, key: &str) -> bool {
        let mut maps = self.maps.write();
        let existed = T::map_mut(&mut maps).remove(key).is_some();
        self.core.delete(key, T::VALUE_TYPE);
        existed
    }

    /// Clear every value and delete the backing files.
    ///
    /// The map write lock is held across the core wipe, which waits for any
    /// flush in progress. Reads block until the wipe is done, and no `set`
    /// can land between clearing the maps and clearing the core queue.
    pub fn wipe_all(&self) {
        let mut maps = self.maps.write();
        maps.clear();
        self.core.wipe_all();
    }

    /// Total number of values across all types.
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.read().is_empty()
    }

    /// Persist pending changes now.
    pub fn flush(&self) -> StoreResult<()> {
        self.core.flush()
    }

    /// Stop the background worker after a final flush.
    pub fn close(self) -> StoreResult<()> {
        self.core.close()
    }

    /// The underlying core store.
    pub fn core(&self) -> &Store {
        &self.core
    }
}

impl std::fmt::Debug for TypedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedStore")
            .field("path", &self.core.path())
            .field("values", &self.len())
            .finish()
    }
}
