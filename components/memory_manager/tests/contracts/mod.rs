//! Contract tests pinning the public memory_manager API.
//! These tests ensure all exported types and functions exist with correct signatures.

use memory_manager::{
    stats, trap, CaptureKind, CaptureResolver, Captured, Closure, HeaderSnapshot, HeapStats,
    LazyClosure, ObjectHeader, PayloadState, RawStrong, RefCountError, Strong, StrongRef,
    Unowned, UnownedOptional, UnownedState, ViolationKind, Weak,
};

/// Test Strong contract: new(value: T) -> Strong<T>
#[test]
fn contract_strong_new() {
    let handle: Strong<i32> = Strong::new(1);
    assert_eq!(*handle, 1);
    assert_eq!(Strong::strong_count(&handle), 1);
}

/// Test Strong contract: with_finalizer(value: T, finalizer: impl FnOnce()) -> Strong<T>
#[test]
fn contract_strong_with_finalizer() {
    let handle: Strong<&str> = Strong::with_finalizer("value", || {});
    assert!(Strong::snapshot(&handle).finalizer_pending);
}

/// Test Strong contract: clone() retains, drop releases
#[test]
fn contract_strong_clone_and_drop() {
    let handle = Strong::new(0u8);
    let copy = handle.clone();
    assert_eq!(Strong::strong_count(&handle), 2);
    assert!(Strong::ptr_eq(&handle, &copy));
    drop(copy);
    assert_eq!(Strong::strong_count(&handle), 1);
}

/// Test Strong contract: header(this) -> &ObjectHeader
#[test]
fn contract_strong_header() {
    let handle = Strong::new(());
    let header: &ObjectHeader<_> = Strong::header(&handle);
    assert_eq!(header.payload_state(), PayloadState::Alive);
    assert!(header.type_name().contains("()"));
}

/// Test Strong contract: snapshot(this) -> HeaderSnapshot
#[test]
fn contract_strong_snapshot() {
    let handle = Strong::new(3);
    let snapshot: HeaderSnapshot = Strong::snapshot(&handle);
    assert_eq!(snapshot.strong_count, 1);
    assert_eq!(snapshot.weak_count, 0);
    assert_eq!(snapshot.unowned_count, 0);
    assert!(!snapshot.has_weak_cell);
    assert!(!snapshot.is_zombie());
}

/// Test Strong contract: into_raw(this) -> RawStrong, from_raw(raw) -> Strong
#[test]
fn contract_strong_raw_round_trip() {
    let handle = Strong::new(String::from("raw"));
    let raw: RawStrong<String, _> = Strong::into_raw(handle);
    // SAFETY: `raw` carries the unit given up by `into_raw`
    let restored = unsafe { Strong::from_raw(raw) };
    assert_eq!(restored.as_str(), "raw");
}

/// Test RawStrong contract: retain() / release() adjust the strong count
#[test]
fn contract_raw_strong_retain_release() {
    let handle = Strong::new(9);
    let raw = Strong::into_raw(handle.clone());
    // SAFETY: the payload is kept alive by `handle`
    unsafe {
        raw.retain();
        assert_eq!(raw.snapshot().strong_count, 3);
        raw.release();
        raw.release();
    }
    assert_eq!(Strong::strong_count(&handle), 1);
}

/// Test Weak contract: downgrade(this) -> Weak<T>
#[test]
fn contract_weak_downgrade() {
    let handle = Strong::new(5);
    let weak: Weak<i32> = Strong::downgrade(&handle);
    assert!(weak.is_present());
    assert_eq!(weak.weak_count(), 1);
}

/// Test Weak contract: read() -> Option<Strong<T>>
#[test]
fn contract_weak_read() {
    let handle = Strong::new(5);
    let weak = Strong::downgrade(&handle);
    assert_eq!(weak.read().map(|v| *v), Some(5));
    assert_eq!(weak.upgrade().map(|v| *v), Some(5));
    drop(handle);
    assert!(weak.read().is_none());
}

/// Test Unowned contract: unowned(this) -> Unowned<T>
#[test]
fn contract_unowned_create() {
    let handle = Strong::new(5);
    let unowned: Unowned<i32> = Strong::unowned(&handle);
    assert!(unowned.is_alive());
    assert!(unowned.refers_to(&handle));
}

/// Test Unowned contract: try_read() -> Result<Strong<T>, RefCountError>
#[test]
fn contract_unowned_try_read() {
    let handle = Strong::new(5);
    let unowned = Strong::unowned(&handle);
    let value: Result<Strong<i32>, RefCountError> = unowned.try_read();
    assert_eq!(value.map(|v| *v), Ok(5));
}

/// Test UnownedOptional contract: unset / new / set / clear / state / get
#[test]
fn contract_unowned_optional() {
    let handle = Strong::new(5);
    let mut reference: UnownedOptional<i32> = UnownedOptional::default();
    assert_eq!(reference.state(), UnownedState::Unset);
    reference.set(Some(&handle));
    assert_eq!(reference.state(), UnownedState::Live);
    assert_eq!(reference.get().map(|v| *v), Some(5));
    reference.clear();
    assert!(!reference.is_set());
    assert!(UnownedOptional::new(&handle).is_set());
}

/// Test RefCountError contract: kind() -> ViolationKind, type_name() -> &str
#[test]
fn contract_ref_count_error() {
    let err = RefCountError::OverRelease { type_name: "Person" };
    assert_eq!(err.kind(), ViolationKind::OverRelease);
    assert_eq!(err.type_name(), "Person");
    assert!(err.to_string().contains("Person"));
}

/// Test trap contract: trap(error) -> ! (panics under the default policy)
#[test]
fn contract_trap_panics() {
    let outcome = std::panic::catch_unwind(|| {
        trap::trap(RefCountError::UnownedAccessAfterFree { type_name: "Customer" });
    });
    assert!(outcome.is_err());
}

/// Test stats contract: snapshot() -> HeapStats
#[test]
fn contract_stats_snapshot() {
    let before: HeapStats = stats::snapshot();
    drop(Strong::new(1));
    let delta = stats::snapshot().since(&before);
    assert_eq!(delta.instances_allocated, 1);
    assert_eq!(delta.live_instances(), 0);
}

/// Test Captured contract: strong / weak / unowned / kind()
#[test]
fn contract_captured_kinds() {
    let handle = Strong::new(1);
    assert_eq!(Captured::strong(&handle).kind(), CaptureKind::Strong);
    assert_eq!(Captured::weak(&handle).kind(), CaptureKind::Weak);
    assert_eq!(Captured::unowned(&handle).kind(), CaptureKind::Unowned);
}

/// Test CaptureResolver contract: unlisted captures default to strong
#[test]
fn contract_capture_resolver_default() {
    let resolver = CaptureResolver::default();
    assert_eq!(resolver.default_kind(), CaptureKind::Strong);
    assert_eq!(resolver.kind_for(None), CaptureKind::Strong);
    assert_eq!(resolver.kind_for(Some(CaptureKind::Weak)), CaptureKind::Weak);
}

/// Test Closure contract: new(captures, body) -> Closure, call() -> R
#[test]
fn contract_closure_call() {
    let handle = Strong::new(20);
    let closure = Closure::new(Captured::weak(&handle), |value| value.map(|v| *v + 1));
    assert_eq!(closure.call(), Some(21));
}

/// Test LazyClosure contract: get_or_init builds once, clear() drops it
#[test]
fn contract_lazy_closure() {
    let property: LazyClosure<(), u8> = LazyClosure::new();
    assert!(!property.is_initialized());
    let first = property.get_or_init(|| Closure::new((), |()| 1));
    let second = property.get_or_init(|| Closure::new((), |()| 2));
    assert_eq!(first.call(), second.call());
    assert!(property.clear());
    assert!(!property.clear());
}

/// Test StrongRef contract: handles of the atomic model are Send + Sync
#[test]
fn contract_sync_handles_are_thread_safe() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<memory_manager::sync::Strong<u32>>();
    assert_send_sync::<memory_manager::sync::Weak<u32>>();
    assert_send_sync::<memory_manager::sync::Unowned<u32>>();
    let _: fn(u32) -> StrongRef<u32, memory_manager::Shared> = memory_manager::sync::Strong::new;
}
