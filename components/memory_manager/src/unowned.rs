//! Unowned (assumed-valid) references.
//!
//! An unowned handle does not keep the payload alive and is never nulled.
//! Its creator asserts that the target outlives every read. The handle holds
//! a side unit, so the header stays resident after the payload dies and a
//! stale read is always detected through the header instead of touching
//! freed memory. Detection traps: the process does not continue with a
//! stale value.

use core_types::RefCountError;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::header::{reclaim, Instance, ObjectHeader};
use crate::model::{Model, Shared};
use crate::strong::StrongRef;
use crate::trap::unwrap_or_trap;

/// A non-owning reference that traps when read after its target died.
///
/// # Examples
///
/// ```
/// use memory_manager::Strong;
///
/// let customer = Strong::new("David");
/// let back_edge = Strong::unowned(&customer);
/// assert_eq!(*back_edge.read(), "David");
///
/// drop(customer);
/// assert!(back_edge.try_read().is_err());
/// ```
pub struct UnownedRef<T, M: Model> {
    ptr: NonNull<Instance<T, M>>,
    _marker: PhantomData<Instance<T, M>>,
}

// SAFETY: see `StrongRef`; reads only hand out `StrongRef`s.
unsafe impl<T: Send + Sync> Send for UnownedRef<T, Shared> {}
unsafe impl<T: Send + Sync> Sync for UnownedRef<T, Shared> {}

impl<T, M: Model> UnownedRef<T, M> {
    /// Registers an unowned observer on a live instance.
    ///
    /// # Safety
    ///
    /// The caller must hold a strong unit on `ptr`.
    pub(crate) unsafe fn observe(ptr: NonNull<Instance<T, M>>) -> Self {
        (*ptr.as_ptr()).header.retain_unowned();
        UnownedRef {
            ptr,
            _marker: PhantomData,
        }
    }

    fn header(&self) -> &ObjectHeader<M> {
        // SAFETY: our side unit keeps the header resident
        unsafe { &(*self.ptr.as_ptr()).header }
    }

    /// Returns a strong handle to the target.
    ///
    /// Traps with [`RefCountError::UnownedAccessAfterFree`] if the payload
    /// is no longer alive.
    pub fn read(&self) -> StrongRef<T, M> {
        unwrap_or_trap(self.try_read())
    }

    /// Like [`read`](Self::read), but returns the violation instead of
    /// trapping.
    pub fn try_read(&self) -> core_types::Result<StrongRef<T, M>> {
        let header = self.header();
        if header.try_retain_strong() {
            // SAFETY: we just acquired a strong unit for the new handle
            Ok(unsafe { StrongRef::from_instance(self.ptr) })
        } else {
            Err(RefCountError::UnownedAccessAfterFree {
                type_name: header.type_name(),
            })
        }
    }

    /// Runs `f` on the payload. Traps if the payload is gone.
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let target = self.read();
        f(&target)
    }

    /// Returns true while the payload is alive.
    pub fn is_alive(&self) -> bool {
        self.header().strong_count() > 0
    }

    /// Returns the target's strong count.
    pub fn strong_count(&self) -> usize {
        self.header().strong_count()
    }

    /// Returns the target's combined weak + unowned count.
    pub fn side_count(&self) -> usize {
        self.header().side_count()
    }

    /// Returns true if both handles observe the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Returns true if this handle observes the instance owned by `target`.
    pub fn refers_to(&self, target: &StrongRef<T, M>) -> bool {
        std::ptr::eq(self.header(), StrongRef::header(target))
    }
}

impl<T, M: Model> Clone for UnownedRef<T, M> {
    fn clone(&self) -> Self {
        self.header().retain_unowned();
        UnownedRef {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T, M: Model> Drop for UnownedRef<T, M> {
    fn drop(&mut self) {
        if self.header().release_unowned() {
            // SAFETY: both counts are zero and the payload is gone
            unsafe { reclaim(self.ptr) };
        }
    }
}

impl<T, M: Model> fmt::Debug for UnownedRef<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_alive() {
            write!(f, "(Unowned)")
        } else {
            write!(f, "(Unowned: dangling)")
        }
    }
}

/// State of an [`UnownedOptionalRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnownedState {
    /// Never assigned, or cleared
    Unset,
    /// Assigned and the target is alive
    Live,
    /// Assigned and the target died; reading traps
    Dead,
}

/// An unowned reference that may be unassigned.
///
/// Unlike a weak handle it is not nulled when the target dies: reading a
/// set-and-dead handle traps with
/// [`RefCountError::UnownedOptionalAccessAfterFree`].
pub struct UnownedOptionalRef<T, M: Model> {
    target: Option<UnownedRef<T, M>>,
}

impl<T, M: Model> UnownedOptionalRef<T, M> {
    /// Creates an unassigned handle.
    pub fn unset() -> Self {
        UnownedOptionalRef { target: None }
    }

    /// Creates a handle assigned to `target`.
    pub fn new(target: &StrongRef<T, M>) -> Self {
        UnownedOptionalRef {
            target: Some(StrongRef::unowned(target)),
        }
    }

    /// Reassigns the handle. The previous target's side unit is released.
    pub fn set(&mut self, target: Option<&StrongRef<T, M>>) {
        self.target = target.map(StrongRef::unowned);
    }

    /// Unassigns the handle.
    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Returns true if the handle is assigned, alive or not.
    pub fn is_set(&self) -> bool {
        self.target.is_some()
    }

    /// Returns the three-valued state.
    pub fn state(&self) -> UnownedState {
        match &self.target {
            None => UnownedState::Unset,
            Some(target) if target.is_alive() => UnownedState::Live,
            Some(_) => UnownedState::Dead,
        }
    }

    /// Returns `None` when unset, the target when live, and traps when dead.
    pub fn get(&self) -> Option<StrongRef<T, M>> {
        unwrap_or_trap(self.try_get())
    }

    /// Like [`get`](Self::get), but returns the violation instead of
    /// trapping.
    pub fn try_get(&self) -> core_types::Result<Option<StrongRef<T, M>>> {
        match &self.target {
            None => Ok(None),
            Some(target) => target.try_read().map(Some).map_err(|err| {
                RefCountError::UnownedOptionalAccessAfterFree {
                    type_name: err.type_name(),
                }
            }),
        }
    }
}

impl<T, M: Model> Default for UnownedOptionalRef<T, M> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T, M: Model> Clone for UnownedOptionalRef<T, M> {
    fn clone(&self) -> Self {
        UnownedOptionalRef {
            target: self.target.clone(),
        }
    }
}

impl<T, M: Model> fmt::Debug for UnownedOptionalRef<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(UnownedOptional: {:?})", self.state())
    }
}
