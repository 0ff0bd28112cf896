//! Unit tests for memory_manager components

use memory_manager::{
    stats, sync, CaptureKind, Captured, Closure, PayloadState, Strong, UnownedOptional,
    UnownedState, ViolationKind,
};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_finalizer(calls: &Rc<Cell<usize>>) -> impl FnOnce() + 'static {
    let calls = Rc::clone(calls);
    move || calls.set(calls.get() + 1)
}

// ============================================================================
// Strong Reference Manager Tests
// ============================================================================

#[test]
fn test_payload_alive_tracks_strong_count() {
    let first = Strong::new(1);
    let weak = Strong::downgrade(&first);
    let second = first.clone();

    assert!(Strong::header(&first).payload_alive());
    drop(second);
    assert!(Strong::header(&first).payload_alive());
    assert_eq!(Strong::strong_count(&first), 1);

    drop(first);
    assert_eq!(weak.strong_count(), 0);
    assert!(!weak.is_present());
}

#[test]
fn test_n_retains_then_n_releases() {
    let calls = Rc::new(Cell::new(0));
    let root = Strong::with_finalizer(String::from("root"), counting_finalizer(&calls));

    for n in [1usize, 5, 64] {
        let handles: Vec<_> = (0..n).map(|_| root.clone()).collect();
        assert_eq!(Strong::strong_count(&root), n + 1);
        drop(handles);
        assert_eq!(Strong::strong_count(&root), 1);
        assert_eq!(calls.get(), 0);
    }

    drop(root);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_finalizer_runs_synchronously_before_release_returns() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let finalizer_events = Rc::clone(&events);
    let handle = Strong::with_finalizer(0u8, move || {
        finalizer_events.borrow_mut().push("finalized")
    });

    events.borrow_mut().push("before release");
    drop(handle);
    events.borrow_mut().push("after release");

    assert_eq!(
        *events.borrow(),
        vec!["before release", "finalized", "after release"]
    );
}

#[test]
fn test_snapshot_reports_pending_finalizer() {
    let handle = Strong::with_finalizer(0, || {});
    let snapshot = Strong::snapshot(&handle);
    assert!(snapshot.finalizer_pending);
    assert_eq!(snapshot.strong_count, 1);
    assert_eq!(snapshot.side_count, 0);
    assert!(snapshot.payload_alive);
}

#[test]
fn test_cascading_destruction_releases_children() {
    struct Parent {
        _child: Strong<&'static str>,
    }

    let calls = Rc::new(Cell::new(0));
    let child = Strong::with_finalizer("child", counting_finalizer(&calls));
    let observer = Strong::downgrade(&child);
    let parent = Strong::new(Parent { _child: child });

    assert!(observer.is_present());
    drop(parent);
    assert_eq!(calls.get(), 1);
    assert!(observer.read().is_none());
}

#[test]
fn test_finalizer_sees_own_weak_as_absent() {
    let observed = Rc::new(Cell::new(None));
    let slot: Rc<RefCell<Option<memory_manager::Weak<u32>>>> = Rc::new(RefCell::new(None));

    let finalizer_slot = Rc::clone(&slot);
    let finalizer_observed = Rc::clone(&observed);
    let handle = Strong::with_finalizer(5u32, move || {
        let present = finalizer_slot
            .borrow()
            .as_ref()
            .map(|weak| weak.read().is_some());
        finalizer_observed.set(present);
    });
    *slot.borrow_mut() = Some(Strong::downgrade(&handle));

    drop(handle);
    assert_eq!(observed.get(), Some(false));
}

#[test]
fn test_header_state_during_finalization() {
    let seen = Rc::new(Cell::new(None));
    let unowned_slot: Rc<RefCell<Option<memory_manager::Unowned<i32>>>> =
        Rc::new(RefCell::new(None));

    let finalizer_seen = Rc::clone(&seen);
    let finalizer_slot = Rc::clone(&unowned_slot);
    let handle = Strong::with_finalizer(1, move || {
        let alive = finalizer_slot.borrow().as_ref().map(|u| u.is_alive());
        finalizer_seen.set(alive);
    });
    *unowned_slot.borrow_mut() = Some(Strong::unowned(&handle));

    drop(handle);
    assert_eq!(seen.get(), Some(false));

    let slot = unowned_slot.borrow();
    let unowned = slot.as_ref().unwrap();
    assert_eq!(unowned.strong_count(), 0);
    assert_eq!(unowned.side_count(), 1);
}

#[test]
fn test_stats_balance_for_plain_lifecycle() {
    let before = stats::snapshot();
    {
        let a = Strong::new(1);
        let _w = Strong::downgrade(&a);
        let _u = Strong::unowned(&a);
    }
    let delta = stats::snapshot().since(&before);
    assert_eq!(delta.instances_allocated, 1);
    assert_eq!(delta.payloads_destroyed, 1);
    assert_eq!(delta.headers_reclaimed, 1);
    assert_eq!(delta.weak_cells_allocated, 1);
    assert_eq!(delta.weak_cells_reclaimed, 1);
    assert_eq!(delta.live_instances(), 0);
    assert_eq!(delta.zombie_headers(), 0);
}

// ============================================================================
// Weak Reference Table Tests
// ============================================================================

#[test]
fn test_many_weak_handles_share_one_cell() {
    let before = stats::snapshot();
    let target = Strong::new(0u64);
    let handles: Vec<_> = (0..100).map(|_| Strong::downgrade(&target)).collect();

    assert_eq!(Strong::weak_count(&target), 100);
    assert_eq!(stats::snapshot().since(&before).weak_cells_allocated, 1);

    drop(target);
    assert!(handles.iter().all(|w| w.read().is_none()));
}

#[test]
fn test_weak_clone_counts_as_observer() {
    let target = Strong::new(());
    let weak = Strong::downgrade(&target);
    let clone = weak.clone();
    assert_eq!(Strong::side_count(&target), 2);
    drop(weak);
    assert_eq!(Strong::side_count(&target), 1);
    drop(clone);
    assert_eq!(Strong::side_count(&target), 0);
    assert!(Strong::snapshot(&target).has_weak_cell);
}

// ============================================================================
// Unowned Reference Tracker Tests
// ============================================================================

#[test]
fn test_unowned_trap_is_catchable_and_counted() {
    let before = stats::snapshot();
    let target = Strong::new("card holder");
    let unowned = Strong::unowned(&target);
    drop(target);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = unowned.read();
    }));
    assert!(outcome.is_err());
    assert_eq!(stats::snapshot().since(&before).traps, 1);
}

#[test]
fn test_unowned_optional_reassignment_moves_side_unit() {
    let first = Strong::new(1);
    let second = Strong::new(2);
    let mut reference = UnownedOptional::new(&first);
    assert_eq!(Strong::unowned_count(&first), 1);

    reference.set(Some(&second));
    assert_eq!(Strong::unowned_count(&first), 0);
    assert_eq!(Strong::unowned_count(&second), 1);
    assert_eq!(reference.get().map(|v| *v), Some(2));

    reference.set(None);
    assert_eq!(reference.state(), UnownedState::Unset);
    assert_eq!(Strong::unowned_count(&second), 0);
}

#[test]
fn test_unowned_optional_dead_is_not_nil() {
    let target = Strong::new(0);
    let reference = UnownedOptional::new(&target);
    drop(target);

    assert!(reference.is_set());
    assert_eq!(reference.state(), UnownedState::Dead);
    assert_eq!(
        reference.try_get().unwrap_err().kind(),
        ViolationKind::UnownedOptionalAccessAfterFree
    );
}

// ============================================================================
// Closure Capture Resolver Tests
// ============================================================================

#[test]
fn test_closure_reports_capture_kinds() {
    let a = Strong::new(1);
    let b = Strong::new(2);
    let c = Strong::new(3);
    let closure = Closure::new(
        (Captured::strong(&a), Captured::weak(&b), Captured::unowned(&c)),
        |(a, b, c)| a.is_some() && b.is_some() && c.is_some(),
    );

    assert!(closure.call());
    assert_eq!(
        closure.capture_kinds(),
        vec![CaptureKind::Strong, CaptureKind::Weak, CaptureKind::Unowned]
    );
    assert!(closure.retains_strongly());
    assert_eq!(format!("{:?}", closure.captures().1), "Captured(weak)");
}

#[test]
fn test_closure_without_captures() {
    let closure = Closure::new((), |()| 42);
    assert_eq!(closure.call(), 42);
    assert!(closure.capture_kinds().is_empty());
    assert!(!closure.retains_strongly());
}

// ============================================================================
// Shared Model Tests
// ============================================================================

#[test]
fn test_shared_handles_cross_threads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let finalizer_calls = Arc::clone(&calls);
    let root = sync::Strong::with_finalizer(vec![1u32, 2, 3], move || {
        finalizer_calls.fetch_add(1, Ordering::SeqCst);
    });

    crossbeam::scope(|scope| {
        for _ in 0..8 {
            let local = root.clone();
            scope.spawn(move |_| {
                for _ in 0..1_000 {
                    let copy = local.clone();
                    assert_eq!(copy.iter().sum::<u32>(), 6);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(sync::Strong::strong_count(&root), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    drop(root);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shared_weak_upgrade_races_with_release() {
    let calls = Arc::new(AtomicUsize::new(0));
    let finalizer_calls = Arc::clone(&calls);
    let root = sync::Strong::with_finalizer(String::from("shared"), move || {
        finalizer_calls.fetch_add(1, Ordering::SeqCst);
    });
    let weak = sync::Strong::downgrade(&root);

    crossbeam::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let weak = weak.clone();
                scope.spawn(move |_| {
                    let mut seen_absent = false;
                    for _ in 0..10_000 {
                        match weak.read() {
                            Some(value) => {
                                assert!(!seen_absent, "absence must be permanent");
                                assert_eq!(value.as_str(), "shared");
                            }
                            None => seen_absent = true,
                        }
                    }
                })
            })
            .collect();

        drop(root);
        for reader in readers {
            reader.join().unwrap();
        }
    })
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(weak.read().is_none());
    assert_eq!(weak.strong_count(), 0);
    assert!(!weak.is_present());
}

#[test]
fn test_payload_state_after_release() {
    let root = Strong::new(0);
    let unowned = Strong::unowned(&root);
    assert_eq!(Strong::header(&root).payload_state(), PayloadState::Alive);
    drop(root);
    assert!(!unowned.is_alive());
    assert_eq!(
        unowned.try_read().unwrap_err().kind(),
        ViolationKind::UnownedAccessAfterFree
    );
}

#[test]
fn test_shared_unowned_try_read_after_free() {
    let root = sync::Strong::new(7u64);
    let unowned = sync::Strong::unowned(&root);
    let reader = std::thread::spawn(move || unowned.try_read().map(|v| *v));
    assert_eq!(reader.join().unwrap(), Ok(7));

    let unowned = sync::Strong::unowned(&root);
    drop(root);
    let err = std::thread::spawn(move || unowned.try_read().map(|v| *v).unwrap_err())
        .join()
        .unwrap();
    assert_eq!(err.kind(), ViolationKind::UnownedAccessAfterFree);
}
