//! Single memoized lazy value with tri-state cycle detection.

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::{lock_storage, CycleError};

enum State<T> {
    NotComputed,
    /// Computation running on the recorded thread. A second read from that
    /// thread is a cycle; a read from any other thread is a single-writer
    /// precondition violation.
    InProgress(ThreadId),
    Computed(Arc<T>),
}

/// A deferred computation cached after its first successful evaluation.
///
/// Once computed, the value never changes for the lifetime of the handle:
/// every read returns a clone of the same `Arc`, so downstream consumers may
/// cache pointers into it. A computation that panics leaves the handle
/// not-computed, and a later read retries.
pub struct LazyValue<T> {
    name: String,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    state: Mutex<State<T>>,
}

impl<T: Send + Sync + 'static> LazyValue<T> {
    pub(crate) fn new<F>(name: String, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            name,
            compute: Box::new(compute),
            state: Mutex::new(State::NotComputed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once a value has been cached. Force-resolution is complete when
    /// every reachable lazy field reports true.
    pub fn is_computed(&self) -> bool {
        matches!(*lock_storage(&self.state), State::Computed(_))
    }

    /// Returns the cached value, computing it first if necessary.
    ///
    /// The compute closure runs outside the internal lock, so it may freely
    /// read other lazy values. Re-entering *this* handle from within its own
    /// computation yields `Err(CycleError)`.
    pub fn get(&self) -> Result<Arc<T>, CycleError> {
        {
            let mut state = lock_storage(&self.state);
            match &*state {
                State::Computed(value) => return Ok(Arc::clone(value)),
                State::InProgress(owner) => {
                    if *owner == thread::current().id() {
                        return Err(CycleError {
                            name: self.name.clone(),
                        });
                    }
                    panic!(
                        "lazy value `{}` read from a second thread while being computed; \
                         force-resolve before crossing a concurrency boundary",
                        self.name
                    );
                }
                State::NotComputed => *state = State::InProgress(thread::current().id()),
            }
        }

        // Reset to not-computed if the computation unwinds, so a failed
        // evaluation is retried instead of being reported as a cycle forever.
        let guard = ResetGuard { state: &self.state };
        let _span = tracing::trace_span!("lazy_value", name = %self.name).entered();
        let value = Arc::new((self.compute)());
        std::mem::forget(guard);

        *lock_storage(&self.state) = State::Computed(Arc::clone(&value));
        Ok(value)
    }
}

struct ResetGuard<'a, T> {
    state: &'a Mutex<State<T>>,
}

impl<T> Drop for ResetGuard<'_, T> {
    fn drop(&mut self) {
        *lock_storage(self.state) = State::NotComputed;
    }
}

impl<T> std::fmt::Debug for LazyValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyValue")
            .field("name", &self.name)
            .field("computed", &matches!(*lock_storage(&self.state), State::Computed(_)))
            .finish()
    }
}
