//! Point-in-time view of an object header.

use serde::Serialize;

/// A copy of an instance's header counters at one instant.
///
/// `side_count` is always `weak_count + unowned_count`; the split is kept
/// for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeaderSnapshot {
    /// Live owning references
    pub strong_count: usize,
    /// Live weak and unowned observers
    pub side_count: usize,
    /// Live weak observers
    pub weak_count: usize,
    /// Live unowned observers (including set unowned optionals)
    pub unowned_count: usize,
    /// Whether the payload is still alive
    pub payload_alive: bool,
    /// Whether the lazily allocated weak cell exists
    pub has_weak_cell: bool,
    /// Whether a finalizer is still pending
    pub finalizer_pending: bool,
}

impl HeaderSnapshot {
    /// True when the payload is gone but observers keep the header resident.
    pub fn is_zombie(&self) -> bool {
        !self.payload_alive && self.side_count > 0
    }
}
