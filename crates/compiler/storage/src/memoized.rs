//! Per-key memoized functions with strong or weak retention.

use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

use rustc_hash::FxHashMap;

use crate::{lock_storage, CycleError, ReferenceKind};

enum Table<K, V> {
    Strong(FxHashMap<K, Arc<V>>),
    Weak(FxHashMap<K, Weak<V>>),
}

struct Entries<K, V> {
    table: Table<K, V>,
    in_progress: FxHashMap<K, ThreadId>,
}

/// A function whose results are cached per argument.
///
/// With [`ReferenceKind::Strong`] an entry, once computed, is returned as the
/// same `Arc` for the lifetime of the function. With [`ReferenceKind::Weak`]
/// an entry survives only while some caller still holds the `Arc`; after
/// reclamation the key is silently recomputed, so correctness must not depend
/// on retention.
pub struct MemoizedFunction<K, V> {
    name: String,
    compute: Box<dyn Fn(&K) -> V + Send + Sync>,
    entries: Mutex<Entries<K, V>>,
}

impl<K, V> MemoizedFunction<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new<F>(name: String, kind: ReferenceKind, compute: F) -> Self
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        let table = match kind {
            ReferenceKind::Strong => Table::Strong(FxHashMap::default()),
            ReferenceKind::Weak => Table::Weak(FxHashMap::default()),
        };
        Self {
            name,
            compute: Box::new(compute),
            entries: Mutex::new(Entries {
                table,
                in_progress: FxHashMap::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if a live cached entry exists for `key` right now.
    pub fn is_computed(&self, key: &K) -> bool {
        let entries = lock_storage(&self.entries);
        match &entries.table {
            Table::Strong(map) => map.contains_key(key),
            Table::Weak(map) => map.get(key).is_some_and(|weak| weak.strong_count() > 0),
        }
    }

    /// Returns the cached value for `key`, computing it first if necessary.
    ///
    /// Re-entering the same key from within its own computation yields
    /// `Err(CycleError)`; distinct keys may recurse into each other freely.
    pub fn invoke(&self, key: K) -> Result<Arc<V>, CycleError> {
        {
            let mut entries = lock_storage(&self.entries);
            match &mut entries.table {
                Table::Strong(map) => {
                    if let Some(value) = map.get(&key) {
                        return Ok(Arc::clone(value));
                    }
                }
                Table::Weak(map) => {
                    if let Some(weak) = map.get(&key) {
                        if let Some(value) = weak.upgrade() {
                            return Ok(value);
                        }
                        // Reclaimed; recompute below.
                        map.remove(&key);
                    }
                }
            }
            if let Some(owner) = entries.in_progress.get(&key) {
                if *owner == thread::current().id() {
                    return Err(CycleError {
                        name: format!("{}({:?})", self.name, key),
                    });
                }
                panic!(
                    "memoized function `{}` invoked for in-flight key {:?} from a second \
                     thread; force-resolve before crossing a concurrency boundary",
                    self.name, key
                );
            }
            entries
                .in_progress
                .insert(key.clone(), thread::current().id());
        }

        // Always clear the in-progress marker, including on unwind, so a
        // failed computation is retried rather than reported as a cycle.
        let _guard = ClearGuard {
            entries: &self.entries,
            key: key.clone(),
        };
        let _span = tracing::trace_span!("memoized", name = %self.name, key = ?key).entered();
        let value = Arc::new((self.compute)(&key));

        let mut entries = lock_storage(&self.entries);
        match &mut entries.table {
            Table::Strong(map) => {
                map.insert(key, Arc::clone(&value));
            }
            Table::Weak(map) => {
                map.insert(key, Arc::downgrade(&value));
            }
        }
        drop(entries);
        Ok(value)
    }
}

struct ClearGuard<'a, K: Eq + Hash, V> {
    entries: &'a Mutex<Entries<K, V>>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for ClearGuard<'_, K, V> {
    fn drop(&mut self) {
        lock_storage(self.entries).in_progress.remove(&self.key);
    }
}

impl<K, V> std::fmt::Debug for MemoizedFunction<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoizedFunction")
            .field("name", &self.name)
            .finish()
    }
}
