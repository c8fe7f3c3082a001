use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use crate::{ReferenceKind, StorageManager};

fn manager() -> Arc<StorageManager> {
    StorageManager::new("test-session")
}

#[test]
fn lazy_value_computes_exactly_once() {
    let storage = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_compute = Arc::clone(&calls);
    let value = storage.create_lazy_value("answer", move || {
        calls_in_compute.fetch_add(1, Ordering::SeqCst);
        42u32
    });

    assert!(!value.is_computed());
    let first = value.get().unwrap();
    let second = value.get().unwrap();

    assert_eq!(*first, 42);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(value.is_computed());
}

#[test]
fn reentrant_read_reports_cycle() {
    let storage = manager();
    let value = Arc::new_cyclic(|weak: &std::sync::Weak<_>| {
        let weak = weak.clone();
        storage.create_lazy_value("self-referential", move || {
            let this: Arc<crate::LazyValue<Result<u32, crate::CycleError>>> =
                weak.upgrade().unwrap();
            match this.get() {
                Ok(inner) => (*inner).clone(),
                Err(cycle) => Err(cycle),
            }
        })
    });

    let outer = value.get().unwrap();
    let cycle = outer.as_ref().clone().unwrap_err();
    assert!(cycle.name.contains("self-referential"));
    // The cycle was contained: the outer computation still cached a value.
    assert!(value.is_computed());
}

#[test]
fn panicked_computation_is_retried() {
    let storage = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_compute = Arc::clone(&calls);
    let value = storage.create_lazy_value("flaky", move || {
        if calls_in_compute.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first attempt fails");
        }
        7u32
    });

    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| value.get()));
    assert!(panicked.is_err());
    assert!(!value.is_computed());

    // Second read retries instead of reporting a phantom cycle.
    assert_eq!(*value.get().unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn memoized_function_caches_per_key() {
    let storage = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_compute = Arc::clone(&calls);
    let doubler = storage.create_memoized_function(
        "double",
        ReferenceKind::Strong,
        move |key: &u32| {
            calls_in_compute.fetch_add(1, Ordering::SeqCst);
            key * 2
        },
    );

    let a1 = doubler.invoke(3).unwrap();
    let a2 = doubler.invoke(3).unwrap();
    let b = doubler.invoke(4).unwrap();

    assert_eq!(*a1, 6);
    assert_eq!(*b, 8);
    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(doubler.is_computed(&3));
    assert!(!doubler.is_computed(&5));
}

#[test]
fn weak_entries_are_recomputed_after_reclamation() {
    let storage = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_compute = Arc::clone(&calls);
    let f = storage.create_memoized_function("weak", ReferenceKind::Weak, move |key: &u32| {
        calls_in_compute.fetch_add(1, Ordering::SeqCst);
        *key + 1
    });

    let held = f.invoke(1).unwrap();
    let again = f.invoke(1).unwrap();
    assert!(Arc::ptr_eq(&held, &again));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(held);
    drop(again);
    assert!(!f.is_computed(&1));

    let recomputed = f.invoke(1).unwrap();
    assert_eq!(*recomputed, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn distinct_keys_may_recurse_into_each_other() {
    // fib-style recursion through the memoized function itself.
    let storage = manager();
    let f: Arc<crate::MemoizedFunction<u64, u64>> = Arc::new_cyclic(|weak| {
        let weak = weak.clone();
        storage.create_memoized_function("fib", ReferenceKind::Strong, move |key: &u64| {
            let this: Arc<crate::MemoizedFunction<u64, u64>> = weak.upgrade().unwrap();
            match *key {
                0 | 1 => 1,
                n => *this.invoke(n - 1).unwrap() + *this.invoke(n - 2).unwrap(),
            }
        })
    });

    assert_eq!(*f.invoke(10).unwrap(), 89);
}

#[test]
fn in_flight_lazy_value_rejects_reads_from_other_threads() {
    let storage = manager();
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let value = Arc::new(storage.create_lazy_value("blocked", {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        move || {
            entered.wait();
            release.wait();
            42u32
        }
    }));

    let owner = {
        let value = Arc::clone(&value);
        std::thread::spawn(move || value.get().unwrap())
    };
    // Wait until the owner thread is inside the computation.
    entered.wait();

    let intruder = {
        let value = Arc::clone(&value);
        std::thread::spawn(move || value.get())
    };
    let panic = intruder.join().expect_err("second reader must panic");
    let message = panic.downcast_ref::<String>().expect("panic carries a message");
    assert!(message.contains("second thread"), "unexpected message: {message}");

    // The owner is unaffected and still publishes its value.
    release.wait();
    assert_eq!(*owner.join().unwrap(), 42);
    assert!(value.is_computed());
}

#[test]
fn in_flight_memoized_key_rejects_calls_from_other_threads() {
    let storage = manager();
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let f = Arc::new(storage.create_memoized_function(
        "blocked",
        ReferenceKind::Strong,
        {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            move |key: &u32| {
                entered.wait();
                release.wait();
                key * 2
            }
        },
    ));

    let owner = {
        let f = Arc::clone(&f);
        std::thread::spawn(move || f.invoke(21).unwrap())
    };
    entered.wait();

    let intruder = {
        let f = Arc::clone(&f);
        std::thread::spawn(move || f.invoke(21))
    };
    let panic = intruder.join().expect_err("second caller must panic");
    let message = panic.downcast_ref::<String>().expect("panic carries a message");
    assert!(message.contains("second thread"), "unexpected message: {message}");

    release.wait();
    assert_eq!(*owner.join().unwrap(), 42);
}

#[test]
fn same_key_reentry_reports_cycle() {
    let storage = manager();
    let f: Arc<crate::MemoizedFunction<u32, Result<u32, crate::CycleError>>> =
        Arc::new_cyclic(
            |weak: &std::sync::Weak<crate::MemoizedFunction<u32, Result<u32, crate::CycleError>>>| {
                let weak = weak.clone();
                storage.create_memoized_function("loop", ReferenceKind::Strong, move |key: &u32| {
                    let this = weak.upgrade().unwrap();
                    match this.invoke(*key) {
                        Ok(inner) => (*inner).clone(),
                        Err(cycle) => Err(cycle),
                    }
                })
            },
        );

    let outer = f.invoke(9).unwrap();
    let cycle = outer.as_ref().clone().unwrap_err();
    assert!(cycle.name.contains("loop"));
    assert!(cycle.name.contains('9'));
}
