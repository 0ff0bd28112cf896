//! Weak references through a per-instance indirection cell.
//!
//! Many weak handles may observe one instance. Rather than tracking each
//! handle, the instance owns exactly one [`WeakCell`], allocated on the first
//! [`StrongRef::downgrade`]. Every weak handle points at that cell. When the
//! payload dies the cell's target pointer is nulled once, which invalidates
//! all outstanding weak handles in O(1).
//!
//! The cell also keeps a permanent back-pointer to the header so a weak
//! handle can still release its side unit after the target was nulled. The
//! cell is freed together with the header.

use log::trace;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::header::{reclaim, Instance, ObjectHeader};
use crate::model::{Model, PointerSlot, Shared};
use crate::strong::StrongRef;

/// The shared indirection cell behind every weak handle of one instance.
pub struct WeakCell<M: Model> {
    /// Owning header; valid until the header is reclaimed
    header: NonNull<ObjectHeader<M>>,
    /// Same address as `header` while the payload is alive, null afterwards
    target: M::Slot,
}

impl<M: Model> WeakCell<M> {
    pub(crate) fn new(header: NonNull<ObjectHeader<M>>) -> Self {
        let target = <M::Slot as PointerSlot>::null();
        target.store(header.as_ptr() as *mut ());
        WeakCell { header, target }
    }

    /// Nulls the target. Called once, when the payload starts dying.
    pub(crate) fn invalidate(&self) {
        self.target.store(ptr::null_mut());
        trace!("[{}] weak cell invalidated", M::NAME);
    }

    /// Returns true until the target payload starts dying.
    pub fn is_present(&self) -> bool {
        !self.target.load().is_null()
    }

    fn target(&self) -> *mut ObjectHeader<M> {
        self.target.load() as *mut ObjectHeader<M>
    }
}

/// A non-owning reference that reads as absent once its target dies.
///
/// Use [`WeakRef::read`] to observe the target. A successful read returns a
/// temporary [`StrongRef`], so the presence check and any use of the value
/// form one step: the payload cannot die while the returned handle lives.
///
/// # Examples
///
/// ```
/// use memory_manager::Strong;
///
/// let tenant = Strong::new("Alice".to_string());
/// let weak = Strong::downgrade(&tenant);
/// assert_eq!(weak.read().as_deref().map(String::as_str), Some("Alice"));
///
/// drop(tenant);
/// assert!(weak.read().is_none());
/// ```
pub struct WeakRef<T, M: Model> {
    cell: NonNull<WeakCell<M>>,
    _marker: PhantomData<Instance<T, M>>,
}

// SAFETY: under the shared model all header fields are atomics or locks, and
// a weak handle only hands out `StrongRef`s, which require `T: Send + Sync`.
unsafe impl<T: Send + Sync> Send for WeakRef<T, Shared> {}
unsafe impl<T: Send + Sync> Sync for WeakRef<T, Shared> {}

impl<T, M: Model> WeakRef<T, M> {
    /// Registers a weak observer on a live instance.
    ///
    /// # Safety
    ///
    /// The caller must hold a strong unit on `ptr`.
    pub(crate) unsafe fn observe(ptr: NonNull<Instance<T, M>>) -> Self {
        let header = &(*ptr.as_ptr()).header;
        let cell = header.weak_cell_or_init(ptr.cast());
        header.retain_weak();
        WeakRef {
            cell,
            _marker: PhantomData,
        }
    }

    fn cell(&self) -> &WeakCell<M> {
        // SAFETY: this handle's side unit keeps the header, and therefore the
        // cell, resident
        unsafe { self.cell.as_ref() }
    }

    fn header(&self) -> &ObjectHeader<M> {
        // SAFETY: see `cell`
        unsafe { self.cell().header.as_ref() }
    }

    /// Returns the target if its payload is alive.
    ///
    /// Once this returns `None` it returns `None` forever.
    pub fn read(&self) -> Option<StrongRef<T, M>> {
        let target = self.cell().target();
        if target.is_null() {
            return None;
        }
        // SAFETY: a non-null target is the header this cell belongs to
        let header = unsafe { &*target };
        if !header.try_retain_strong() {
            return None;
        }
        // SAFETY: the header sits at offset zero of its instance and we just
        // acquired a strong unit for the new handle
        Some(unsafe { StrongRef::from_instance(NonNull::new_unchecked(target).cast()) })
    }

    /// Alias for [`WeakRef::read`].
    pub fn upgrade(&self) -> Option<StrongRef<T, M>> {
        self.read()
    }

    /// Returns true while a read would succeed.
    pub fn is_present(&self) -> bool {
        self.cell().is_present() && self.header().strong_count() > 0
    }

    /// Returns the target's strong count (zero once it died).
    pub fn strong_count(&self) -> usize {
        self.header().strong_count()
    }

    /// Returns the number of weak handles sharing this cell.
    pub fn weak_count(&self) -> usize {
        self.header().weak_count()
    }

    /// Returns the target's combined weak + unowned count.
    pub fn side_count(&self) -> usize {
        self.header().side_count()
    }

    /// Returns true if both handles observe the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.cell == other.cell
    }
}

impl<T, M: Model> Clone for WeakRef<T, M> {
    fn clone(&self) -> Self {
        self.header().retain_weak();
        WeakRef {
            cell: self.cell,
            _marker: PhantomData,
        }
    }
}

impl<T, M: Model> Drop for WeakRef<T, M> {
    fn drop(&mut self) {
        let header = self.cell().header;
        // SAFETY: our side unit keeps the header resident until this release
        if unsafe { header.as_ref() }.release_weak() {
            // SAFETY: both counts are zero and the payload is gone
            unsafe { reclaim::<T, M>(header.cast()) };
        }
    }
}

impl<T, M: Model> fmt::Debug for WeakRef<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_present() {
            write!(f, "(Weak)")
        } else {
            write!(f, "(Weak: absent)")
        }
    }
}
