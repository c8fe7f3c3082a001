//! # Storage Manager
//!
//! Memoized lazy values and memoized functions, the primitive the lazy
//! resolution engine is built on.
//!
//! A [`StorageManager`] is created once per analysis session. Every
//! [`LazyValue`] and [`MemoizedFunction`] it hands out caches its result for
//! the lifetime of the handle; dropping the session drops every cache with it.
//! There is no process-global state.
//!
//! ## Evaluation discipline
//!
//! Values are computed by whichever thread first reads them, synchronously.
//! A re-entrant read from the same thread while the computation is still
//! running is a resolution cycle and fails fast with [`CycleError`]. A read
//! from a *different* thread while a computation is in flight violates the
//! single-writer precondition (callers must force-resolve before sharing
//! results across threads) and panics rather than deadlocking or returning a
//! torn value.

mod lazy;
mod memoized;

#[cfg(test)]
mod storage_tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub use lazy::LazyValue;
pub use memoized::MemoizedFunction;

/// Raised when a lazy computation re-enters itself.
///
/// This is the cycle-detection safety net: the engine converts it into a
/// diagnostic at the declaration that closed the cycle instead of hanging or
/// overflowing the stack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("recursive resolution of `{name}`")]
pub struct CycleError {
    /// Debug name of the handle whose computation re-entered itself.
    pub name: String,
}

/// Controls whether a memoized entry may be reclaimed under memory pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Entries live as long as the function. For expensive, rarely-invalidated
    /// computations whose identity downstream consumers rely on.
    Strong,
    /// Entries are held weakly and may be silently recomputed once every
    /// external reference is gone. For cheap-to-rebuild per-file caches.
    Weak,
}

/// Session-scoped factory for lazy values and memoized functions.
///
/// The manager itself holds no caches; it exists to scope them. All handles
/// created through one manager belong to one analysis session and die with it.
#[derive(Debug)]
pub struct StorageManager {
    debug_name: String,
    handles_created: AtomicUsize,
}

impl StorageManager {
    pub fn new(debug_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            debug_name: debug_name.into(),
            handles_created: AtomicUsize::new(0),
        })
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// Number of lazy handles created through this manager so far.
    pub fn handles_created(&self) -> usize {
        self.handles_created.load(Ordering::Relaxed)
    }

    /// Creates a handle that invokes `compute` on first read and caches the
    /// result forever. Repeated reads return the same `Arc`.
    pub fn create_lazy_value<T, F>(&self, name: impl Into<String>, compute: F) -> LazyValue<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.handles_created.fetch_add(1, Ordering::Relaxed);
        LazyValue::new(self.qualify(name.into()), compute)
    }

    /// Creates a per-key memoized function with the given reference kind.
    pub fn create_memoized_function<K, V, F>(
        &self,
        name: impl Into<String>,
        kind: ReferenceKind,
        compute: F,
    ) -> MemoizedFunction<K, V>
    where
        K: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + 'static,
        V: Send + Sync + 'static,
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        self.handles_created.fetch_add(1, Ordering::Relaxed);
        MemoizedFunction::new(self.qualify(name.into()), kind, compute)
    }

    fn qualify(&self, name: String) -> String {
        format!("{}/{}", self.debug_name, name)
    }
}

/// Locks a storage mutex, ignoring poisoning.
///
/// A panicking compute closure unwinds through the reset guard, which holds
/// the lock briefly and poisons it; the guarded state is valid again by then,
/// so the poison flag carries no information here.
pub(crate) fn lock_storage<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
