//! Memory Manager - Reference-counted heap instances
//!
//! This component provides:
//! - Object headers with strong and side (weak + unowned) counts
//! - Two-phase deallocation: payload on the last strong release, header on
//!   the last observer release
//! - Weak references through a lazily allocated per-instance cell, nulled
//!   in O(1) when the payload dies
//! - Unowned references that trap instead of reading a dead payload
//! - Closure capture resolution (strong, weak, unowned capture lists)
//! - A single-threaded model ([`Local`], the default) and an atomic model
//!   ([`Shared`], see [`sync`])
//!
//! Strong reference cycles are not detected or collected. Model the back
//! edge of a cycle as a [`Weak`] or [`Unowned`] handle.

pub mod capture;
pub mod header;
pub mod model;
pub mod stats;
pub mod strong;
pub mod trap;
pub mod unowned;
pub mod weak;

// Re-export main types
pub use capture::{CaptureKind, CaptureResolver, CaptureSet, Captured, Closure, LazyClosure};
pub use header::ObjectHeader;
pub use model::{IntoFinalizer, Local, Model, PayloadState, Shared};
pub use strong::{RawStrong, StrongRef};
pub use unowned::{UnownedOptionalRef, UnownedRef, UnownedState};
pub use weak::{WeakCell, WeakRef};

pub use core_types::{HeaderSnapshot, HeapStats, RefCountError, ViolationKind};

/// Owning reference, single-threaded model.
pub type Strong<T> = StrongRef<T, Local>;
/// Observing reference, single-threaded model.
pub type Weak<T> = WeakRef<T, Local>;
/// Assumed-valid reference, single-threaded model.
pub type Unowned<T> = UnownedRef<T, Local>;
/// Optional assumed-valid reference, single-threaded model.
pub type UnownedOptional<T> = UnownedOptionalRef<T, Local>;

/// Handles with atomic counts, usable across threads.
///
/// Finalizers must be `Send`; payloads must be `Send + Sync` for the
/// handles to cross threads. The finalizer runs on whichever thread drops
/// the last strong handle.
pub mod sync {
    use crate::{Shared, StrongRef, UnownedOptionalRef, UnownedRef, WeakRef};

    /// Owning reference, atomic model.
    pub type Strong<T> = StrongRef<T, Shared>;
    /// Observing reference, atomic model.
    pub type Weak<T> = WeakRef<T, Shared>;
    /// Assumed-valid reference, atomic model.
    pub type Unowned<T> = UnownedRef<T, Shared>;
    /// Optional assumed-valid reference, atomic model.
    pub type UnownedOptional<T> = UnownedOptionalRef<T, Shared>;
}
