//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a transparent wrapper over
//! one raw [`Container`] that turns every property access into a tracked read
//! and every mutation into a change notification.
//!
//! # How Signals Work
//!
//! 1. When a property is read within a running computation, the signal
//!    records a dependency edge `(signal, key)` for that computation.
//!
//! 2. When a property is written to a different value, the signal emits a
//!    [`Change`] for that key.
//!
//! 3. The runtime hands the change to every subscribed computation.
//!
//! All read paths go through [`Signal::track`] and all mutation paths go
//! through [`Signal::notify`]. The collection adapters in
//! [`collections`](super::collections) are built on the same two primitives.
//!
//! # Identity
//!
//! Signals are memoized per container: wrapping the same container twice
//! yields the same signal, and `==` on signals compares identity. A child
//! container reached through a parent is wrapped lazily, on read.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::graph::{Change, ChangeKind, ContainerId, Key, SignalId};

use super::runtime::{Runtime, RuntimeInner};

/// A caller-owned raw value that signals can wrap.
///
/// Cloning a container clones the handle, not the value. Accessing the value
/// through [`Container::borrow`] / [`Container::borrow_mut`] bypasses
/// tracking entirely.
pub struct Container<T> {
    id: ContainerId,
    data: Rc<RefCell<T>>,
}

impl<T> Container<T> {
    /// Create a new container holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            id: ContainerId::new(),
            data: Rc::new(RefCell::new(value)),
        }
    }

    /// Stable identity of this container.
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Unobserved shared access to the raw value.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.data.borrow()
    }

    /// Unobserved mutable access to the raw value.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.data.borrow_mut()
    }
}

impl<T> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: Rc::clone(&self.data),
        }
    }
}

impl<T> PartialEq for Container<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Container<T> {}

impl<T: Debug> Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("value", &*self.data.borrow())
            .finish()
    }
}

/// Writing a signal into a property stores its raw container, never the
/// wrapper itself.
impl<T: 'static> From<&Signal<T>> for Container<T> {
    fn from(signal: &Signal<T>) -> Self {
        signal.container().clone()
    }
}

impl<T: 'static> From<Signal<T>> for Container<T> {
    fn from(signal: Signal<T>) -> Self {
        signal.container().clone()
    }
}

pub(crate) struct SignalInner<T: 'static> {
    id: SignalId,
    container: Container<T>,
    runtime: Weak<RuntimeInner>,
}

impl<T: 'static> Drop for SignalInner<T> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release_signal(self.id, self.container.id());
        }
    }
}

/// An observable wrapper over a [`Container`].
///
/// # Example
///
/// ```rust
/// use ripple_core::{Runtime, Record};
///
/// let rt = Runtime::new();
/// let state = rt.signal(Record::from([("v".to_string(), 1)]));
///
/// let s = state.clone();
/// let doubled = rt.effect(move |_| Ok(s.get("v").unwrap_or(0) * 2)).unwrap();
///
/// state.insert("v", 5).unwrap();
/// assert_eq!(doubled.value(), Some(10));
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a fresh signal bound to `runtime`. Does not consult the registry.
    pub(crate) fn attach(runtime: &Rc<RuntimeInner>, container: Container<T>) -> Self {
        Self::build(Rc::downgrade(runtime), container)
    }

    /// Create a signal that belongs to no runtime. Reads are never tracked and
    /// writes notify nobody.
    pub(crate) fn detached(container: Container<T>) -> Self {
        Self::build(Weak::new(), container)
    }

    fn build(runtime: Weak<RuntimeInner>, container: Container<T>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SignalId::new(),
                container,
                runtime,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<SignalInner<T>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade_any(&self) -> Weak<dyn Any> {
        let weak: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
        weak
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// The raw container behind this signal.
    pub fn container(&self) -> &Container<T> {
        &self.inner.container
    }

    /// The runtime this signal reports to, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade().map(Runtime::from_inner)
    }

    /// Whether two handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Record a read of `key` against the running computation, if any.
    pub fn track(&self, key: impl Into<Key>) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(self.id(), key.into(), || {
                let retained: Rc<dyn Any> = self.inner.clone();
                retained
            });
        }
    }

    /// Deliver a change notification to the subscribers of `change.key`.
    pub fn notify(&self, change: Change) -> Result<()> {
        match self.runtime() {
            Some(runtime) => runtime.notify(change),
            None => Ok(()),
        }
    }

    /// Deliver several changes as one batch.
    ///
    /// Bulk mutators touch many properties at once; coalescing keeps each
    /// subscriber to a single re-run.
    pub(crate) fn notify_all(&self, changes: Vec<Change>) -> Result<()> {
        match (self.runtime(), changes.len()) {
            (None, _) | (_, 0) => Ok(()),
            (Some(runtime), 1) => changes
                .into_iter()
                .try_for_each(|change| runtime.notify(change)),
            (Some(runtime), _) => runtime.batch(|| {
                changes
                    .into_iter()
                    .try_for_each(|change| runtime.notify(change))
            }),
        }
    }

    pub(crate) fn change(&self, key: Key, kind: ChangeKind) -> Change {
        Change::new(self.id(), key, kind)
    }

    /// Tracked read of `key`, projected through `f`.
    pub fn read<R>(&self, key: impl Into<Key>, f: impl FnOnce(&T) -> R) -> R {
        self.track(key);
        f(&self.inner.container.borrow())
    }

    /// Untracked read of the whole value.
    pub fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.container.borrow())
    }

    /// Write `value` into the property selected by `lens`.
    ///
    /// Nothing happens if the property already holds an equal value.
    /// Returns whether a change was emitted.
    pub fn write<V>(
        &self,
        key: impl Into<Key>,
        lens: impl FnOnce(&mut T) -> &mut V,
        value: V,
    ) -> Result<bool>
    where
        V: PartialEq + Clone + 'static,
    {
        let was = {
            let mut data = self.inner.container.borrow_mut();
            let slot = lens(&mut *data);
            if *slot == value {
                return Ok(false);
            }
            std::mem::replace(slot, value.clone())
        };

        let change = self
            .change(key.into(), ChangeKind::Set)
            .with_was(was)
            .with_now(value);
        self.notify(change)?;
        Ok(true)
    }

    /// Tracked read of a container-valued property, returned as its signal.
    ///
    /// The child is wrapped on first access and memoized like any other
    /// container.
    pub fn child<U: 'static>(
        &self,
        key: impl Into<Key>,
        lens: impl FnOnce(&T) -> &Container<U>,
    ) -> Signal<U> {
        let container = self.read(key, |data| lens(data).clone());
        self.wrap_child(container)
    }

    /// Store a container (or the container behind a signal) in a property.
    ///
    /// Identity decides equality, so re-storing the same container is a no-op.
    pub fn write_child<U: 'static>(
        &self,
        key: impl Into<Key>,
        lens: impl FnOnce(&mut T) -> &mut Container<U>,
        value: impl Into<Container<U>>,
    ) -> Result<bool> {
        self.write(key, lens, value.into())
    }

    /// Mutate the value in place and notify `key` unconditionally.
    pub fn mutate<R>(&self, key: impl Into<Key>, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let out = f(&mut self.inner.container.borrow_mut());
        self.notify(self.change(key.into(), ChangeKind::Set))?;
        Ok(out)
    }

    pub(crate) fn wrap_child<U: 'static>(&self, container: Container<U>) -> Signal<U> {
        match self.runtime() {
            Some(runtime) => runtime.wrap(&container),
            None => Signal::detached(container),
        }
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: 'static> Eq for Signal<T> {}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("container", &self.inner.container.id())
            .field("value", &*self.inner.container.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Result signals
// ----------------------------------------------------------------------------

/// A computation's result signal holds a single field: the last value the
/// computation produced, or `None` before the first value arrives.
impl<T: Clone + PartialEq + 'static> Signal<Option<T>> {
    /// Tracked read of the current value.
    pub fn value(&self) -> Option<T> {
        self.read(Key::VALUE, Clone::clone)
    }

    /// Untracked read of the current value.
    pub fn peek_value(&self) -> Option<T> {
        self.peek(Clone::clone)
    }

    /// Replace the value, notifying readers if it differs.
    pub fn set_value(&self, value: Option<T>) -> Result<bool> {
        self.write(Key::VALUE, |slot| slot, value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
