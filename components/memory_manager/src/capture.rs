//! Closure capture resolution.
//!
//! A deferred block that touches outer instances binds each of them, once,
//! at construction time, through exactly one handle kind:
//!
//! - [`CaptureKind::Strong`] (the default): the closure owns the instance.
//!   Storing such a closure on the instance it captures forms a strong
//!   cycle that is never finalized.
//! - [`CaptureKind::Weak`]: the closure observes the instance; every call
//!   re-checks presence and sees `None` once the instance died.
//! - [`CaptureKind::Unowned`]: the closure asserts the instance outlives it;
//!   a call after the instance died traps.
//!
//! Nothing here breaks cycles. The kind chosen by the closure's author
//! selects which of the three behaviours applies.

use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::model::{Local, Model};
use crate::strong::StrongRef;
use crate::unowned::UnownedRef;
use crate::weak::WeakRef;

/// How a closure holds a captured instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CaptureKind {
    /// Owning capture
    #[default]
    Strong,
    /// Observing capture, re-checked on every call
    Weak,
    /// Assumed-valid capture, trapping on stale use
    Unowned,
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureKind::Strong => "strong",
            CaptureKind::Weak => "weak",
            CaptureKind::Unowned => "unowned",
        };
        f.write_str(name)
    }
}

/// One captured instance, bound through the handle kind chosen at capture
/// time.
pub enum Captured<T, M: Model = Local> {
    /// Owning capture
    Strong(StrongRef<T, M>),
    /// Observing capture
    Weak(WeakRef<T, M>),
    /// Assumed-valid capture
    Unowned(UnownedRef<T, M>),
}

impl<T, M: Model> Captured<T, M> {
    /// Binds `target` through the handle kind `kind`.
    pub fn bind(target: &StrongRef<T, M>, kind: CaptureKind) -> Self {
        match kind {
            CaptureKind::Strong => Captured::Strong(target.clone()),
            CaptureKind::Weak => Captured::Weak(StrongRef::downgrade(target)),
            CaptureKind::Unowned => Captured::Unowned(StrongRef::unowned(target)),
        }
    }

    /// Owning capture of `target`.
    pub fn strong(target: &StrongRef<T, M>) -> Self {
        Self::bind(target, CaptureKind::Strong)
    }

    /// Observing capture of `target`.
    pub fn weak(target: &StrongRef<T, M>) -> Self {
        Self::bind(target, CaptureKind::Weak)
    }

    /// Assumed-valid capture of `target`.
    pub fn unowned(target: &StrongRef<T, M>) -> Self {
        Self::bind(target, CaptureKind::Unowned)
    }

    /// Returns the kind this capture was bound with.
    pub fn kind(&self) -> CaptureKind {
        match self {
            Captured::Strong(_) => CaptureKind::Strong,
            Captured::Weak(_) => CaptureKind::Weak,
            Captured::Unowned(_) => CaptureKind::Unowned,
        }
    }

    /// Produces a temporary strong handle for one call.
    ///
    /// Strong captures always resolve. Weak captures resolve to `None` once
    /// the target died. Unowned captures trap once the target died.
    pub fn resolve(&self) -> Option<StrongRef<T, M>> {
        match self {
            Captured::Strong(target) => Some(target.clone()),
            Captured::Weak(target) => target.read(),
            Captured::Unowned(target) => Some(target.read()),
        }
    }
}

impl<T, M: Model> Clone for Captured<T, M> {
    fn clone(&self) -> Self {
        match self {
            Captured::Strong(target) => Captured::Strong(target.clone()),
            Captured::Weak(target) => Captured::Weak(target.clone()),
            Captured::Unowned(target) => Captured::Unowned(target.clone()),
        }
    }
}

impl<T, M: Model> fmt::Debug for Captured<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Captured({})", self.kind())
    }
}

/// A capture list: what a closure holds and how it is resolved per call.
///
/// Implemented for `()` (no captures), a single [`Captured`], and tuples of
/// two or three capture sets.
pub trait CaptureSet {
    /// The values handed to the closure body on each call
    type Resolved;

    /// Resolves every capture for one call.
    fn resolve(&self) -> Self::Resolved;

    /// Appends the kind of every capture, in order.
    fn collect_kinds(&self, kinds: &mut Vec<CaptureKind>);
}

impl CaptureSet for () {
    type Resolved = ();

    fn resolve(&self) {}

    fn collect_kinds(&self, _kinds: &mut Vec<CaptureKind>) {}
}

impl<T, M: Model> CaptureSet for Captured<T, M> {
    type Resolved = Option<StrongRef<T, M>>;

    fn resolve(&self) -> Self::Resolved {
        Captured::resolve(self)
    }

    fn collect_kinds(&self, kinds: &mut Vec<CaptureKind>) {
        kinds.push(self.kind());
    }
}

impl<A: CaptureSet, B: CaptureSet> CaptureSet for (A, B) {
    type Resolved = (A::Resolved, B::Resolved);

    fn resolve(&self) -> Self::Resolved {
        (self.0.resolve(), self.1.resolve())
    }

    fn collect_kinds(&self, kinds: &mut Vec<CaptureKind>) {
        self.0.collect_kinds(kinds);
        self.1.collect_kinds(kinds);
    }
}

impl<A: CaptureSet, B: CaptureSet, C: CaptureSet> CaptureSet for (A, B, C) {
    type Resolved = (A::Resolved, B::Resolved, C::Resolved);

    fn resolve(&self) -> Self::Resolved {
        (self.0.resolve(), self.1.resolve(), self.2.resolve())
    }

    fn collect_kinds(&self, kinds: &mut Vec<CaptureKind>) {
        self.0.collect_kinds(kinds);
        self.1.collect_kinds(kinds);
        self.2.collect_kinds(kinds);
    }
}

/// Chooses the capture kind for instances a closure touches.
///
/// Instances named in an explicit capture list get the listed kind; all
/// others get the resolver's default, which is [`CaptureKind::Strong`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureResolver {
    default_kind: CaptureKind,
}

impl CaptureResolver {
    /// Creates a resolver with `default_kind` for unlisted captures.
    pub fn new(default_kind: CaptureKind) -> Self {
        CaptureResolver { default_kind }
    }

    /// Returns the kind used for unlisted captures.
    pub fn default_kind(&self) -> CaptureKind {
        self.default_kind
    }

    /// Returns `listed` if present, the default otherwise.
    pub fn kind_for(&self, listed: Option<CaptureKind>) -> CaptureKind {
        listed.unwrap_or(self.default_kind)
    }

    /// Binds `target` with the listed kind or the default.
    pub fn capture<T, M: Model>(
        &self,
        target: &StrongRef<T, M>,
        listed: Option<CaptureKind>,
    ) -> Captured<T, M> {
        Captured::bind(target, self.kind_for(listed))
    }
}

/// A deferred block of code together with its capture list.
///
/// # Examples
///
/// ```
/// use memory_manager::{Captured, Closure, Strong};
///
/// let counter = Strong::new(std::cell::Cell::new(0));
/// let bump = Closure::new(Captured::weak(&counter), |counter| {
///     counter.map(|c| c.set(c.get() + 1)).is_some()
/// });
///
/// assert!(bump.call());
/// assert_eq!(counter.get(), 1);
///
/// drop(counter);
/// assert!(!bump.call());
/// ```
pub struct Closure<C: CaptureSet, R> {
    captures: C,
    body: Box<dyn Fn(C::Resolved) -> R>,
}

impl<C: CaptureSet, R> Closure<C, R> {
    /// Creates a closure. The capture list is bound now; `body` runs on each
    /// [`call`](Self::call) with freshly resolved captures.
    pub fn new<F>(captures: C, body: F) -> Self
    where
        F: Fn(C::Resolved) -> R + 'static,
    {
        Closure {
            captures,
            body: Box::new(body),
        }
    }

    /// Resolves the captures and runs the body.
    ///
    /// Resolved strong handles are released when the body returns.
    pub fn call(&self) -> R {
        (self.body)(self.captures.resolve())
    }

    /// Returns the capture list.
    pub fn captures(&self) -> &C {
        &self.captures
    }

    /// Returns the kind of every capture, in order.
    pub fn capture_kinds(&self) -> Vec<CaptureKind> {
        let mut kinds = Vec::new();
        self.captures.collect_kinds(&mut kinds);
        kinds
    }

    /// Returns true if the closure owns any of its captures.
    ///
    /// Such a closure forms a cycle when stored on an instance it captures.
    pub fn retains_strongly(&self) -> bool {
        self.capture_kinds().contains(&CaptureKind::Strong)
    }
}

impl<C: CaptureSet, R> fmt::Debug for Closure<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("captures", &self.capture_kinds())
            .finish()
    }
}

/// A closure property initialised on first access.
///
/// This is the usual place a capture cycle forms: the instance owns the
/// property, and the closure inside captures the instance.
pub struct LazyClosure<C: CaptureSet, R> {
    slot: RefCell<Option<Rc<Closure<C, R>>>>,
}

impl<C: CaptureSet, R> LazyClosure<C, R> {
    /// Creates an uninitialised property.
    pub fn new() -> Self {
        LazyClosure {
            slot: RefCell::new(None),
        }
    }

    /// Returns the closure, building it with `init` on first access.
    pub fn get_or_init<F>(&self, init: F) -> Rc<Closure<C, R>>
    where
        F: FnOnce() -> Closure<C, R>,
    {
        if let Some(closure) = self.slot.borrow().as_ref() {
            return Rc::clone(closure);
        }
        let closure = Rc::new(init());
        *self.slot.borrow_mut() = Some(Rc::clone(&closure));
        closure
    }

    /// Returns true once the closure was built.
    pub fn is_initialized(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Drops the stored closure, releasing its captures.
    ///
    /// Returns whether a closure was stored. The caller must hold a strong
    /// handle to the instance owning this property.
    pub fn clear(&self) -> bool {
        let taken = self.slot.borrow_mut().take();
        taken.is_some()
    }
}

impl<C: CaptureSet, R> Default for LazyClosure<C, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CaptureSet, R> fmt::Debug for LazyClosure<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClosure")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
