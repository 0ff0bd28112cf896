//! Owning references.
//!
//! [`StrongRef`] is the strong reference manager's handle: cloning retains,
//! dropping releases, and the release that takes the count to zero runs the
//! deallocation protocol in [`header`](crate::header) before returning.
//!
//! Callers that insert retain/release themselves use [`RawStrong`], obtained
//! from [`StrongRef::into_raw`].

use core_types::HeaderSnapshot;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::header::{self, Instance, ObjectHeader};
use crate::model::{IntoFinalizer, Model, Shared};
use crate::unowned::UnownedRef;
use crate::weak::WeakRef;

/// An owning reference to a heap instance.
///
/// While any `StrongRef` to an instance exists, its payload is alive. The
/// number of live `StrongRef`s equals the header's strong count.
///
/// Associated functions take `this: &Self` (as `std::rc::Rc` does) so they
/// never shadow methods of the payload reached through `Deref`.
///
/// # Examples
///
/// ```
/// use memory_manager::Strong;
///
/// let first = Strong::new(String::from("John Appleseed"));
/// let second = first.clone();
/// assert_eq!(Strong::strong_count(&first), 2);
///
/// drop(second);
/// assert_eq!(Strong::strong_count(&first), 1);
/// ```
pub struct StrongRef<T, M: Model> {
    ptr: NonNull<Instance<T, M>>,
    _marker: PhantomData<Instance<T, M>>,
}

// SAFETY: under the shared model every header field is an atomic or a lock,
// and the payload is only reachable through `&T`.
unsafe impl<T: Send + Sync> Send for StrongRef<T, Shared> {}
unsafe impl<T: Send + Sync> Sync for StrongRef<T, Shared> {}

impl<T, M: Model> StrongRef<T, M> {
    /// Allocates an instance with no finalizer.
    ///
    /// The payload's own `Drop` still runs when the strong count reaches
    /// zero.
    pub fn new(value: T) -> Self {
        // SAFETY: a fresh instance starts with one strong unit, owned here
        unsafe { Self::from_instance(Instance::allocate(value, None)) }
    }

    /// Allocates an instance whose `finalizer` runs exactly once, when the
    /// strong count goes from one to zero and before the payload is dropped.
    pub fn with_finalizer<F>(value: T, finalizer: F) -> Self
    where
        F: IntoFinalizer<M>,
    {
        let instance = Instance::allocate(value, Some(finalizer.into_finalizer()));
        // SAFETY: as in `new`
        unsafe { Self::from_instance(instance) }
    }

    /// Wraps an instance pointer, taking over one strong unit.
    ///
    /// # Safety
    ///
    /// The caller must own a strong unit on `ptr` and transfer it.
    pub(crate) unsafe fn from_instance(ptr: NonNull<Instance<T, M>>) -> Self {
        StrongRef {
            ptr,
            _marker: PhantomData,
        }
    }

    fn instance(&self) -> &Instance<T, M> {
        // SAFETY: our strong unit keeps the instance resident
        unsafe { self.ptr.as_ref() }
    }

    /// Returns the instance header.
    pub fn header(this: &Self) -> &ObjectHeader<M> {
        &this.instance().header
    }

    /// Copies the header counters.
    pub fn snapshot(this: &Self) -> HeaderSnapshot {
        Self::header(this).snapshot()
    }

    /// Returns the number of strong handles.
    pub fn strong_count(this: &Self) -> usize {
        Self::header(this).strong_count()
    }

    /// Returns the number of weak and unowned observers.
    pub fn side_count(this: &Self) -> usize {
        Self::header(this).side_count()
    }

    /// Returns the number of weak handles.
    pub fn weak_count(this: &Self) -> usize {
        Self::header(this).weak_count()
    }

    /// Returns the number of unowned observers.
    pub fn unowned_count(this: &Self) -> usize {
        Self::header(this).unowned_count()
    }

    /// Creates a weak handle, allocating the weak cell on first use.
    pub fn downgrade(this: &Self) -> WeakRef<T, M> {
        // SAFETY: `this` holds a strong unit
        unsafe { WeakRef::observe(this.ptr) }
    }

    /// Creates an unowned handle.
    pub fn unowned(this: &Self) -> UnownedRef<T, M> {
        // SAFETY: `this` holds a strong unit
        unsafe { UnownedRef::observe(this.ptr) }
    }

    /// Returns true if both handles own the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Returns a pointer to the payload.
    pub fn as_ptr(this: &Self) -> *const T {
        &**this as *const T
    }

    /// Consumes the handle without releasing its strong unit.
    ///
    /// The unit must eventually be given back with [`RawStrong::release`] or
    /// [`StrongRef::from_raw`].
    pub fn into_raw(this: Self) -> RawStrong<T, M> {
        let raw = RawStrong {
            ptr: this.ptr,
            _marker: PhantomData,
        };
        mem::forget(this);
        raw
    }

    /// Rebuilds a handle from a raw strong unit.
    ///
    /// # Safety
    ///
    /// `raw` must carry a strong unit that is not owned by anything else.
    pub unsafe fn from_raw(raw: RawStrong<T, M>) -> Self {
        Self::from_instance(raw.ptr)
    }
}

impl<T, M: Model> Clone for StrongRef<T, M> {
    fn clone(&self) -> Self {
        self.instance().header.retain_strong();
        StrongRef {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T, M: Model> Drop for StrongRef<T, M> {
    fn drop(&mut self) {
        // SAFETY: we own one strong unit and give it back here
        unsafe { header::release(self.ptr) }
    }
}

impl<T, M: Model> Deref for StrongRef<T, M> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the payload outlives every strong handle
        unsafe { self.instance().payload() }
    }
}

impl<T, M: Model> AsRef<T> for StrongRef<T, M> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: fmt::Debug, M: Model> fmt::Debug for StrongRef<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display, M: Model> fmt::Display for StrongRef<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// A strong unit detached from any handle.
///
/// `RawStrong` is `Copy` and does nothing on drop. [`retain`](Self::retain)
/// and [`release`](Self::release) are the manager's explicit operations for
/// callers that place them at construction, assignment and scope exit
/// themselves.
pub struct RawStrong<T, M: Model> {
    ptr: NonNull<Instance<T, M>>,
    _marker: PhantomData<Instance<T, M>>,
}

impl<T, M: Model> RawStrong<T, M> {
    /// Adds one strong unit.
    ///
    /// # Safety
    ///
    /// The instance's payload must be alive.
    pub unsafe fn retain(self) {
        (*self.ptr.as_ptr()).header.retain_strong();
    }

    /// Gives back one strong unit, finalizing on zero.
    ///
    /// Releasing when the count is already zero traps with
    /// [`RefCountError::OverRelease`](core_types::RefCountError::OverRelease)
    /// as long as observers keep the header resident.
    ///
    /// # Safety
    ///
    /// The instance's header must be resident.
    pub unsafe fn release(self) {
        header::release(self.ptr)
    }

    /// Returns the header counters.
    ///
    /// # Safety
    ///
    /// The instance's header must be resident.
    pub unsafe fn snapshot(self) -> HeaderSnapshot {
        (*self.ptr.as_ptr()).header.snapshot()
    }
}

impl<T, M: Model> Clone for RawStrong<T, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, M: Model> Copy for RawStrong<T, M> {}

impl<T, M: Model> fmt::Debug for RawStrong<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawStrong").field(&self.ptr).finish()
    }
}
