use core_types::{HeaderSnapshot, HeapStats};

#[test]
fn test_leaked_cycle_shows_as_live() {
    let stats = HeapStats {
        instances_allocated: 2,
        ..HeapStats::default()
    };
    assert_eq!(stats.live_instances(), 2);
    assert_eq!(stats.zombie_headers(), 0);
}

#[test]
fn test_since_never_underflows() {
    let earlier = HeapStats {
        traps: 3,
        ..HeapStats::default()
    };
    let delta = HeapStats::default().since(&earlier);
    assert_eq!(delta, HeapStats::default());
}

#[test]
fn test_zombie_snapshot() {
    let snapshot = HeaderSnapshot {
        strong_count: 0,
        side_count: 1,
        weak_count: 0,
        unowned_count: 1,
        payload_alive: false,
        has_weak_cell: false,
        finalizer_pending: false,
    };
    assert!(snapshot.is_zombie());
    assert!(!HeaderSnapshot {
        side_count: 0,
        unowned_count: 0,
        ..snapshot
    }
    .is_zombie());
}
