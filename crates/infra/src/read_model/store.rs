use std::hash::Hash;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

/// Key/value store abstraction for disposable read models.
///
/// `list` returns values in first-insertion order: an upsert of an existing
/// key keeps its position, a removed key loses it.
pub trait ReadModelStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn upsert(&self, key: K, value: V);
    fn remove(&self, key: &K) -> Option<V>;
    fn list(&self) -> Vec<V>;
    /// Drop every record (rebuild support).
    fn clear(&self);
}

impl<K, V, S> ReadModelStore<K, V> for Arc<S>
where
    S: ReadModelStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        (**self).remove(key)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory read model store.
#[derive(Debug)]
pub struct InMemoryReadModelStore<K, V> {
    inner: RwLock<IndexMap<K, V>>,
}

impl<K, V> InMemoryReadModelStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryReadModelStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ReadModelStore<K, V> for InMemoryReadModelStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        let entries = self.inner.read().ok()?;
        entries.get(key).cloned()
    }

    fn upsert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.inner.write() {
            entries.insert(key, value);
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.inner.write().ok()?;
        entries.shift_remove(key)
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(entries) => entries.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.inner.write() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keeps_first_insertion_order() {
        let store = InMemoryReadModelStore::new();
        store.upsert("b", 1);
        store.upsert("a", 2);
        store.upsert("b", 3);

        assert_eq!(store.list(), vec![3, 2]);
    }

    #[test]
    fn removed_keys_leave_the_listing() {
        let store = InMemoryReadModelStore::new();
        store.upsert(1, "one");
        store.upsert(2, "two");

        assert_eq!(store.remove(&1), Some("one"));
        assert_eq!(store.remove(&1), None);
        store.upsert(1, "again");
        assert_eq!(store.list(), vec!["two", "again"]);
    }

    #[test]
    fn removing_from_the_middle_keeps_the_rest_in_order() {
        let store = InMemoryReadModelStore::new();
        for (k, v) in [(1, 'a'), (2, 'b'), (3, 'c'), (4, 'd')] {
            store.upsert(k, v);
        }

        store.remove(&2);
        store.upsert(3, 'C');
        assert_eq!(store.list(), vec!['a', 'C', 'd']);
    }

    #[test]
    fn clear_empties_the_store() {
        let store = InMemoryReadModelStore::new();
        store.upsert(1u8, ());
        store.clear();
        assert!(store.list().is_empty());
        assert_eq!(store.get(&1), None);
    }
}
