//! Per-thread lifecycle statistics.
//!
//! Counters are recorded on the thread performing the operation. Under the
//! [`Local`](crate::Local) model that is the only thread touching the
//! instance; under [`Shared`](crate::Shared) the finalization is counted on
//! whichever thread dropped the last strong handle.

use core_types::{config, HeapStats};
use std::cell::Cell;

thread_local! {
    static STATS: Cell<HeapStats> = Cell::new(HeapStats::default());
}

/// Applies `update` to this thread's counters if statistics are enabled.
pub(crate) fn record<F: FnOnce(&mut HeapStats)>(update: F) {
    if !config::current().track_stats {
        return;
    }
    STATS.with(|cell| {
        let mut stats = cell.get();
        update(&mut stats);
        cell.set(stats);
    });
}

/// Returns a copy of this thread's counters.
pub fn snapshot() -> HeapStats {
    STATS.with(Cell::get)
}

/// Zeroes this thread's counters.
pub fn reset() {
    STATS.with(|cell| cell.set(HeapStats::default()));
}
