//! Allocation and lifecycle counters.

use serde::{Deserialize, Serialize};

/// Counters describing instance lifecycles.
///
/// All counters are monotonic; use [`HeapStats::since`] to compare two
/// snapshots taken around a piece of work.
///
/// # Examples
///
/// ```
/// use core_types::HeapStats;
///
/// let before = HeapStats::default();
/// let after = HeapStats {
///     instances_allocated: 3,
///     payloads_destroyed: 2,
///     headers_reclaimed: 1,
///     ..HeapStats::default()
/// };
///
/// let delta = after.since(&before);
/// assert_eq!(delta.live_instances(), 1);
/// assert_eq!(delta.zombie_headers(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    /// Instances created
    pub instances_allocated: u64,
    /// Finalizer callbacks invoked
    pub finalizers_run: u64,
    /// Payloads destroyed (strong count reached zero)
    pub payloads_destroyed: u64,
    /// Headers freed (strong and side counts both zero)
    pub headers_reclaimed: u64,
    /// Weak storage cells allocated
    pub weak_cells_allocated: u64,
    /// Weak storage cells freed together with their header
    pub weak_cells_reclaimed: u64,
    /// Contract violations reported through the trap path
    pub traps: u64,
}

impl HeapStats {
    /// Instances whose payload has not been destroyed yet.
    ///
    /// Includes instances leaked through strong reference cycles.
    pub fn live_instances(&self) -> u64 {
        self.instances_allocated.saturating_sub(self.payloads_destroyed)
    }

    /// Headers kept resident only by weak or unowned observers.
    pub fn zombie_headers(&self) -> u64 {
        self.payloads_destroyed.saturating_sub(self.headers_reclaimed)
    }

    /// Returns the counters accumulated since `earlier`.
    pub fn since(&self, earlier: &HeapStats) -> HeapStats {
        HeapStats {
            instances_allocated: self
                .instances_allocated
                .saturating_sub(earlier.instances_allocated),
            finalizers_run: self.finalizers_run.saturating_sub(earlier.finalizers_run),
            payloads_destroyed: self
                .payloads_destroyed
                .saturating_sub(earlier.payloads_destroyed),
            headers_reclaimed: self
                .headers_reclaimed
                .saturating_sub(earlier.headers_reclaimed),
            weak_cells_allocated: self
                .weak_cells_allocated
                .saturating_sub(earlier.weak_cells_allocated),
            weak_cells_reclaimed: self
                .weak_cells_reclaimed
                .saturating_sub(earlier.weak_cells_reclaimed),
            traps: self.traps.saturating_sub(earlier.traps),
        }
    }
}
