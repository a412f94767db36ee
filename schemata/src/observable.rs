use std::{collections::HashMap, fmt, hash::Hash};

use parking_lot::RwLock;

use crate::{ReadinessRegistry, readiness::Ready};

/// Thread-safe map that fires readiness notifications on every write.
///
/// The store owns two locks: the data lock guarding the map and the lock
/// inside its [`ReadinessRegistry`]. They are taken in that order and never
/// nested with the locks of another store.
///
/// # No missed wakeups
///
/// [`wait_ready`](Self::wait_ready) holds the data read lock across the
/// presence check and the fallback registration. [`upsert`](Self::upsert)
/// notifies only after its write lock is released. A write therefore either
/// lands before the check (and the caller gets a satisfied signal) or after
/// the registration (and the notify reaches the new waiter).
///
/// The opposite race is harmless: a caller may receive a satisfied signal for
/// a key that was absent a moment before it asked.
pub struct ObservableStore<K, V> {
    data: RwLock<HashMap<K, V>>,
    registry: ReadinessRegistry<K>,
}

impl<K, V> ObservableStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            registry: ReadinessRegistry::new(),
        }
    }

    /// Insert or replace the value for `key`, then notify its waiters.
    ///
    /// Returns `true` if an existing value was overwritten.
    pub fn upsert(&self, key: K, value: V) -> bool {
        let overwritten = {
            let mut data = self.data.write();
            data.insert(key.clone(), value).is_some()
        };
        self.registry.notify(&key);
        overwritten
    }

    pub fn lookup(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    /// A signal that fires once `key` is present.
    ///
    /// Already present keys yield a satisfied signal.
    pub fn wait_ready(&self, key: &K) -> Ready {
        let data = self.data.read();
        if data.contains_key(key) {
            return Ready::satisfied();
        }
        let ready = self.registry.wait(key.clone());
        drop(data);
        ready
    }

    /// Point-in-time snapshot of all keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.data.read().keys().cloned().collect()
    }

    /// Point-in-time snapshot of all entries, in no particular order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of callers currently waiting for `key`.
    pub fn waiting(&self, key: &K) -> usize {
        self.registry.pending(key)
    }
}

impl<K, V> Default for ObservableStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ObservableStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableStore")
            .field("len", &self.data.read().len())
            .field("registry", &self.registry)
            .finish()
    }
}
