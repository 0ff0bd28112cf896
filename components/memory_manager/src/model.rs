//! Threading models for object headers.
//!
//! A [`Model`] selects the storage used for every mutable header field:
//!
//! - [`Local`]: plain `Cell`s. Handles are `!Send`; this is the baseline
//!   single-threaded model where every operation is a bounded sequence of
//!   reads and writes.
//! - [`Shared`]: atomics. Decrement-to-zero uses release ordering followed
//!   by an acquire fence so the thread that observes the zero crossing sees
//!   every write made through other handles before it finalizes. Handles are
//!   `Send + Sync` when the payload is.
//!
//! The header itself is written once against these traits, so both models
//! share one implementation of the deallocation protocol.

use crossbeam::atomic::AtomicCell;
use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{self, AtomicPtr, AtomicUsize, Ordering};

/// Counts above this are treated as a runaway retain loop.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Lifecycle of the payload owned by an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadState {
    /// At least one strong reference exists
    Alive,
    /// Strong count reached zero; finalizer and payload drop in progress
    Destroying,
    /// Payload dropped; only the header remains
    Destroyed,
}

/// A reference counter.
pub trait Count {
    /// Creates a counter holding `value`.
    fn new(value: usize) -> Self;

    /// Returns the current value.
    fn get(&self) -> usize;

    /// Adds one, returning the previous value.
    fn increment(&self) -> usize;

    /// Subtracts one, returning the previous value.
    ///
    /// A counter already at zero is left unchanged and `0` is returned, so
    /// the caller can report the over-release without corrupting the count.
    fn decrement(&self) -> usize;

    /// Adds one unless the counter is zero. Returns whether it incremented.
    fn increment_if_nonzero(&self) -> bool;
}

/// Storage for the [`PayloadState`].
pub trait StateCell {
    /// Creates the cell in `state`.
    fn new(state: PayloadState) -> Self;
    /// Reads the state.
    fn get(&self) -> PayloadState;
    /// Writes the state.
    fn set(&self, state: PayloadState);
}

/// A nullable, type-erased pointer slot.
pub trait PointerSlot {
    /// Creates a null slot.
    fn null() -> Self;
    /// Reads the pointer.
    fn load(&self) -> *mut ();
    /// Overwrites the pointer.
    fn store(&self, ptr: *mut ());
    /// Stores `ptr` if the slot is null; otherwise returns the occupant.
    fn publish(&self, ptr: *mut ()) -> Result<(), *mut ()>;
}

/// A stored finalizer callback.
pub trait Finalize {
    /// Invokes the callback, consuming it.
    fn finalize(self);
}

impl Finalize for Box<dyn FnOnce()> {
    fn finalize(self) {
        self()
    }
}

impl Finalize for Box<dyn FnOnce() + Send> {
    fn finalize(self) {
        self()
    }
}

/// Slot holding at most one finalizer; taking it empties the slot.
pub trait FinalizerSlot {
    /// The callback type stored in this slot.
    type Callback: Finalize;
    /// Creates a slot holding `callback`.
    fn new(callback: Option<Self::Callback>) -> Self;
    /// Removes the callback.
    fn take(&self) -> Option<Self::Callback>;
    /// Whether a callback is still stored.
    fn is_set(&self) -> bool;
}

/// A threading model: the storage used by every mutable header field.
pub trait Model: Sized + 'static {
    /// Strong/side counters
    type Count: Count;
    /// Payload state
    type State: StateCell;
    /// Weak cell pointers
    type Slot: PointerSlot;
    /// Finalizer storage
    type Finalizer: FinalizerSlot;
    /// Name used in log output
    const NAME: &'static str;
}

/// Single-threaded model (the default).
#[derive(Debug)]
pub enum Local {}

/// Multi-threaded model with atomic counts.
#[derive(Debug)]
pub enum Shared {}

impl Model for Local {
    type Count = Cell<usize>;
    type State = Cell<PayloadState>;
    type Slot = Cell<*mut ()>;
    type Finalizer = Cell<Option<Box<dyn FnOnce()>>>;
    const NAME: &'static str = "local";
}

impl Model for Shared {
    type Count = AtomicUsize;
    type State = AtomicCell<PayloadState>;
    type Slot = AtomicPtr<()>;
    type Finalizer = parking_lot::Mutex<Option<Box<dyn FnOnce() + Send>>>;
    const NAME: &'static str = "shared";
}

/// Conversion of a closure into a model's finalizer callback.
///
/// Implemented for any `FnOnce() + 'static` under [`Local`] and any
/// `FnOnce() + Send + 'static` under [`Shared`].
pub trait IntoFinalizer<M: Model> {
    /// Boxes the closure.
    fn into_finalizer(self) -> <M::Finalizer as FinalizerSlot>::Callback;
}

impl<F: FnOnce() + 'static> IntoFinalizer<Local> for F {
    fn into_finalizer(self) -> Box<dyn FnOnce()> {
        Box::new(self)
    }
}

impl<F: FnOnce() + Send + 'static> IntoFinalizer<Shared> for F {
    fn into_finalizer(self) -> Box<dyn FnOnce() + Send> {
        Box::new(self)
    }
}

impl Count for Cell<usize> {
    fn new(value: usize) -> Self {
        Cell::new(value)
    }

    fn get(&self) -> usize {
        Cell::get(self)
    }

    fn increment(&self) -> usize {
        let previous = Cell::get(self);
        if previous >= MAX_REFCOUNT {
            std::process::abort();
        }
        self.set(previous + 1);
        previous
    }

    fn decrement(&self) -> usize {
        let previous = Cell::get(self);
        if previous > 0 {
            self.set(previous - 1);
        }
        previous
    }

    fn increment_if_nonzero(&self) -> bool {
        if Cell::get(self) == 0 {
            return false;
        }
        self.increment();
        true
    }
}

impl Count for AtomicUsize {
    fn new(value: usize) -> Self {
        AtomicUsize::new(value)
    }

    fn get(&self) -> usize {
        self.load(Ordering::Acquire)
    }

    fn increment(&self) -> usize {
        let previous = self.fetch_add(1, Ordering::Relaxed);
        if previous >= MAX_REFCOUNT {
            std::process::abort();
        }
        previous
    }

    fn decrement(&self) -> usize {
        let previous = self
            .fetch_update(Ordering::Release, Ordering::Relaxed, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous == 1 {
            atomic::fence(Ordering::Acquire);
        }
        previous
    }

    fn increment_if_nonzero(&self) -> bool {
        self.fetch_update(Ordering::Acquire, Ordering::Relaxed, |n| {
            if n == 0 || n >= MAX_REFCOUNT {
                None
            } else {
                Some(n + 1)
            }
        })
        .is_ok()
    }
}

impl StateCell for Cell<PayloadState> {
    fn new(state: PayloadState) -> Self {
        Cell::new(state)
    }

    fn get(&self) -> PayloadState {
        Cell::get(self)
    }

    fn set(&self, state: PayloadState) {
        Cell::set(self, state)
    }
}

impl StateCell for AtomicCell<PayloadState> {
    fn new(state: PayloadState) -> Self {
        AtomicCell::new(state)
    }

    fn get(&self) -> PayloadState {
        self.load()
    }

    fn set(&self, state: PayloadState) {
        self.store(state)
    }
}

impl PointerSlot for Cell<*mut ()> {
    fn null() -> Self {
        Cell::new(ptr::null_mut())
    }

    fn load(&self) -> *mut () {
        self.get()
    }

    fn store(&self, ptr: *mut ()) {
        self.set(ptr)
    }

    fn publish(&self, ptr: *mut ()) -> Result<(), *mut ()> {
        let occupant = self.get();
        if occupant.is_null() {
            self.set(ptr);
            Ok(())
        } else {
            Err(occupant)
        }
    }
}

impl PointerSlot for AtomicPtr<()> {
    fn null() -> Self {
        AtomicPtr::new(ptr::null_mut())
    }

    fn load(&self) -> *mut () {
        AtomicPtr::load(self, Ordering::Acquire)
    }

    fn store(&self, ptr: *mut ()) {
        AtomicPtr::store(self, ptr, Ordering::Release)
    }

    fn publish(&self, ptr: *mut ()) -> Result<(), *mut ()> {
        self.compare_exchange(ptr::null_mut(), ptr, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }
}

impl FinalizerSlot for Cell<Option<Box<dyn FnOnce()>>> {
    type Callback = Box<dyn FnOnce()>;

    fn new(callback: Option<Self::Callback>) -> Self {
        Cell::new(callback)
    }

    fn take(&self) -> Option<Self::Callback> {
        Cell::take(self)
    }

    fn is_set(&self) -> bool {
        let callback = Cell::take(self);
        let set = callback.is_some();
        self.set(callback);
        set
    }
}

impl FinalizerSlot for parking_lot::Mutex<Option<Box<dyn FnOnce() + Send>>> {
    type Callback = Box<dyn FnOnce() + Send>;

    fn new(callback: Option<Self::Callback>) -> Self {
        parking_lot::Mutex::new(callback)
    }

    fn take(&self) -> Option<Self::Callback> {
        self.lock().take()
    }

    fn is_set(&self) -> bool {
        self.lock().is_some()
    }
}
