//! Object headers and the two-phase deallocation protocol.
//!
//! Every instance is a single heap block laid out as
//!
//! ```text
//! +----------------------------+
//! | ObjectHeader<M>            |  strong, side, weak, unowned counts,
//! |                            |  payload state, weak cell, finalizer
//! +----------------------------+
//! | payload: T (ManuallyDrop)  |
//! +----------------------------+
//! ```
//!
//! Phase one runs when the strong count reaches zero: the weak cell is
//! invalidated, the finalizer runs, and the payload is dropped in place.
//! Phase two frees the block once the side count is also zero.
//!
//! The side counter holds one extra unit on behalf of all strong handles
//! until phase one completes. A weak or unowned handle dropped from inside
//! a finalizer (or from another thread under [`Shared`](crate::Shared))
//! therefore never frees the header while the payload is still being torn
//! down. [`ObjectHeader::side_count`] hides that unit.

use core_types::{HeaderSnapshot, RefCountError};
use log::{debug, trace};
use std::any;
use std::cell::UnsafeCell;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use crate::model::{Count, Finalize, FinalizerSlot, Model, PayloadState, PointerSlot, StateCell};
use crate::stats;
use crate::trap::trap;
use crate::weak::WeakCell;

/// Finalizer callback type of model `M`.
pub type Callback<M> = <<M as Model>::Finalizer as FinalizerSlot>::Callback;

/// Per-instance reference-counting metadata.
///
/// The header is the single source of truth for every handle kind; handles
/// never cache counts.
#[repr(C)]
pub struct ObjectHeader<M: Model> {
    /// Live strong handles
    strong: M::Count,
    /// Live weak + unowned observers, plus one unit while the payload exists
    side: M::Count,
    /// Weak share of `side` (diagnostic)
    weak: M::Count,
    /// Unowned share of `side` (diagnostic)
    unowned: M::Count,
    /// Payload lifecycle
    state: M::State,
    /// Lazily allocated `WeakCell<M>`, null until the first weak handle
    weak_cell: M::Slot,
    /// Invoked once when `strong` goes from one to zero
    finalizer: M::Finalizer,
    /// Payload type name for diagnostics
    type_name: &'static str,
}

impl<M: Model> ObjectHeader<M> {
    fn new(type_name: &'static str, finalizer: Option<Callback<M>>) -> Self {
        ObjectHeader {
            strong: <M::Count as Count>::new(1),
            side: <M::Count as Count>::new(1),
            weak: <M::Count as Count>::new(0),
            unowned: <M::Count as Count>::new(0),
            state: <M::State as StateCell>::new(PayloadState::Alive),
            weak_cell: <M::Slot as PointerSlot>::null(),
            finalizer: <M::Finalizer as FinalizerSlot>::new(finalizer),
            type_name,
        }
    }

    /// Returns the number of live strong handles.
    pub fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Returns the number of live weak and unowned observers.
    pub fn side_count(&self) -> usize {
        let held_for_payload = match self.state.get() {
            PayloadState::Destroyed => 0,
            PayloadState::Alive | PayloadState::Destroying => 1,
        };
        self.side.get().saturating_sub(held_for_payload)
    }

    /// Returns the number of live weak handles.
    pub fn weak_count(&self) -> usize {
        self.weak.get()
    }

    /// Returns the number of live unowned observers.
    pub fn unowned_count(&self) -> usize {
        self.unowned.get()
    }

    /// Returns the payload lifecycle state.
    pub fn payload_state(&self) -> PayloadState {
        self.state.get()
    }

    /// Returns true until phase one of deallocation starts.
    pub fn payload_alive(&self) -> bool {
        self.state.get() == PayloadState::Alive
    }

    /// Returns the payload type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Copies the header counters.
    pub fn snapshot(&self) -> HeaderSnapshot {
        HeaderSnapshot {
            strong_count: self.strong_count(),
            side_count: self.side_count(),
            weak_count: self.weak_count(),
            unowned_count: self.unowned_count(),
            payload_alive: self.payload_alive(),
            has_weak_cell: !self.weak_cell().is_null(),
            finalizer_pending: self.finalizer.is_set(),
        }
    }

    pub(crate) fn retain_strong(&self) {
        let previous = self.strong.increment();
        trace!(
            "[{}] retain {}: strong {} -> {}",
            M::NAME,
            self.type_name,
            previous,
            previous + 1
        );
    }

    /// Returns true when this release dropped the strong count to zero.
    ///
    /// Traps if the count was already zero.
    pub(crate) fn release_strong(&self) -> bool {
        let previous = self.strong.decrement();
        if previous == 0 {
            trap(RefCountError::OverRelease {
                type_name: self.type_name,
            });
        }
        trace!(
            "[{}] release {}: strong {} -> {}",
            M::NAME,
            self.type_name,
            previous,
            previous - 1
        );
        previous == 1
    }

    /// Retains unless the strong count already reached zero.
    pub(crate) fn try_retain_strong(&self) -> bool {
        self.strong.increment_if_nonzero()
    }

    pub(crate) fn retain_weak(&self) {
        self.side.increment();
        let previous = self.weak.increment();
        trace!("[{}] weak {}: {} -> {}", M::NAME, self.type_name, previous, previous + 1);
    }

    /// Returns true when the header must now be reclaimed.
    pub(crate) fn release_weak(&self) -> bool {
        self.weak.decrement();
        self.release_side()
    }

    pub(crate) fn retain_unowned(&self) {
        self.side.increment();
        let previous = self.unowned.increment();
        trace!("[{}] unowned {}: {} -> {}", M::NAME, self.type_name, previous, previous + 1);
    }

    /// Returns true when the header must now be reclaimed.
    pub(crate) fn release_unowned(&self) -> bool {
        self.unowned.decrement();
        self.release_side()
    }

    fn release_side(&self) -> bool {
        self.side.decrement() == 1
    }

    pub(crate) fn weak_cell(&self) -> *mut WeakCell<M> {
        self.weak_cell.load() as *mut WeakCell<M>
    }

    /// Returns the weak cell, allocating it on first use.
    ///
    /// `base` must be the address of the instance owning this header.
    pub(crate) fn weak_cell_or_init(&self, base: NonNull<ObjectHeader<M>>) -> NonNull<WeakCell<M>> {
        if let Some(cell) = NonNull::new(self.weak_cell()) {
            return cell;
        }

        let fresh = Box::into_raw(Box::new(WeakCell::new(base)));
        match self.weak_cell.publish(fresh as *mut ()) {
            Ok(()) => {
                stats::record(|s| s.weak_cells_allocated += 1);
                debug!("[{}] weak cell allocated for {}", M::NAME, self.type_name);
                // SAFETY: Box::into_raw never returns null
                unsafe { NonNull::new_unchecked(fresh) }
            }
            Err(occupant) => {
                // SAFETY: `fresh` lost the race and was never shared
                unsafe { drop(Box::from_raw(fresh)) };
                // SAFETY: publish only fails on a non-null occupant
                unsafe { NonNull::new_unchecked(occupant as *mut WeakCell<M>) }
            }
        }
    }

    /// Phase one, step one: mark the payload dead and null the weak cell.
    fn begin_destroy(&self) {
        self.state.set(PayloadState::Destroying);
        // SAFETY: the cell lives as long as the header
        if let Some(cell) = unsafe { self.weak_cell().as_ref() } {
            cell.invalidate();
        }
    }

    fn run_finalizer(&self) {
        if let Some(callback) = self.finalizer.take() {
            debug!("[{}] finalizing {}", M::NAME, self.type_name);
            callback.finalize();
            stats::record(|s| s.finalizers_run += 1);
        }
    }

    /// Phase one done. Returns true when the header must now be reclaimed.
    ///
    /// The state flips before the payload unit is released so no observer
    /// can reclaim the header while this call still reads it.
    fn finish_destroy(&self) -> bool {
        let remaining = self.observers_besides_payload_unit();
        self.state.set(PayloadState::Destroyed);
        stats::record(|s| s.payloads_destroyed += 1);
        debug!(
            "[{}] payload of {} destroyed, {} observer(s) remain",
            M::NAME,
            self.type_name,
            remaining
        );
        self.release_side()
    }

    /// Side units held by weak and unowned handles while the payload unit
    /// is still counted.
    fn observers_besides_payload_unit(&self) -> usize {
        self.side.get().saturating_sub(1)
    }
}

/// One heap block: header followed by payload.
#[repr(C)]
pub(crate) struct Instance<T, M: Model> {
    pub(crate) header: ObjectHeader<M>,
    payload: UnsafeCell<ManuallyDrop<T>>,
}

impl<T, M: Model> Instance<T, M> {
    /// Allocates an instance with a strong count of one.
    pub(crate) fn allocate(value: T, finalizer: Option<Callback<M>>) -> NonNull<Self> {
        let type_name = any::type_name::<T>();
        let instance = Box::new(Instance {
            header: ObjectHeader::new(type_name, finalizer),
            payload: UnsafeCell::new(ManuallyDrop::new(value)),
        });
        stats::record(|s| s.instances_allocated += 1);
        trace!("[{}] allocated {}", M::NAME, type_name);

        // SAFETY: Box::into_raw never returns null
        unsafe { NonNull::new_unchecked(Box::into_raw(instance)) }
    }

    /// Returns the payload.
    ///
    /// # Safety
    ///
    /// The payload must be alive and stay alive while the reference is used.
    pub(crate) unsafe fn payload(&self) -> &T {
        &*self.payload.get()
    }
}

/// Releases one strong unit and runs the deallocation protocol on zero.
///
/// # Safety
///
/// `ptr` must point to an instance whose header is still resident. The
/// caller gives up the strong unit it owned; releasing a unit that was never
/// owned traps only while the header is kept resident by observers.
pub(crate) unsafe fn release<T, M: Model>(ptr: NonNull<Instance<T, M>>) {
    let header = &(*ptr.as_ptr()).header;
    if !header.release_strong() {
        return;
    }

    header.begin_destroy();
    header.run_finalizer();
    // SAFETY: the strong count is zero, so no handle can reach the payload,
    // and phase one runs exactly once per instance
    ManuallyDrop::drop(&mut *(*ptr.as_ptr()).payload.get());

    if header.finish_destroy() {
        reclaim(ptr);
    }
}

/// Phase two: frees the header, its weak cell and the payload storage.
///
/// # Safety
///
/// Both counts must be zero and the payload already dropped.
pub(crate) unsafe fn reclaim<T, M: Model>(ptr: NonNull<Instance<T, M>>) {
    let instance = Box::from_raw(ptr.as_ptr());
    let cell = instance.header.weak_cell();
    if !cell.is_null() {
        drop(Box::from_raw(cell));
        stats::record(|s| s.weak_cells_reclaimed += 1);
    }
    stats::record(|s| s.headers_reclaimed += 1);
    debug!("[{}] header of {} reclaimed", M::NAME, instance.header.type_name);
    // The payload is ManuallyDrop; only header storage is released here.
    drop(instance);
}
