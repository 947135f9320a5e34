//! Property Keys and Change Notifications
//!
//! A dependency edge connects a computation to one *property* of a signal,
//! not to the signal as a whole. Keys name those properties. Two synthetic
//! keys cover reads that do not target a single property:
//!
//! - [`Key::Len`]: the size of a sequence, set, or mapping
//! - [`Key::Iterate`]: the key set / iteration shape, read by existence checks
//!   and enumeration
//!
//! Every mutation produces a [`Change`] describing what happened. Changes are
//! delivered to the computations subscribed to `(change.signal, change.key)`
//! and collected in their pending-change accumulator.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use super::SignalId;

/// Identifies one observable property of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// A named field or string key.
    Name(Cow<'static, str>),
    /// A position in a sequence or an unsigned key.
    Index(usize),
    /// A signed integer key.
    Int(i64),
    /// Size / length of a collection.
    Len,
    /// Key set and iteration order of a collection.
    Iterate,
}

impl Key {
    /// The single field of a computation's result signal.
    pub const VALUE: Key = Key::Name(Cow::Borrowed("value"));

    /// Build a named key from a static string.
    pub const fn name(name: &'static str) -> Self {
        Key::Name(Cow::Borrowed(name))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Int(int) => write!(f, "[{int}]"),
            Key::Len => f.write_str("<len>"),
            Key::Iterate => f.write_str("<iterate>"),
        }
    }
}

impl From<&'static str> for Key {
    fn from(name: &'static str) -> Self {
        Key::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Cow::Owned(name))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Types usable as keys of an observable mapping.
pub trait ToKey {
    /// The dependency-graph key for this mapping key.
    fn to_key(&self) -> Key;
}

impl ToKey for str {
    fn to_key(&self) -> Key {
        Key::Name(Cow::Owned(self.to_owned()))
    }
}

impl ToKey for String {
    fn to_key(&self) -> Key {
        Key::Name(Cow::Owned(self.clone()))
    }
}

impl<T: ToKey + ?Sized> ToKey for &T {
    fn to_key(&self) -> Key {
        (**self).to_key()
    }
}

impl ToKey for char {
    fn to_key(&self) -> Key {
        Key::Name(Cow::Owned(self.to_string()))
    }
}

impl ToKey for usize {
    fn to_key(&self) -> Key {
        Key::Index(*self)
    }
}

impl ToKey for u32 {
    fn to_key(&self) -> Key {
        Key::Index(*self as usize)
    }
}

impl ToKey for i32 {
    fn to_key(&self) -> Key {
        Key::Int(i64::from(*self))
    }
}

impl ToKey for i64 {
    fn to_key(&self) -> Key {
        Key::Int(*self)
    }
}

/// What a mutation did to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An existing property received a different value.
    Set,
    /// A property that did not exist before was created.
    Add,
    /// A property was removed.
    Delete,
    /// The size of a collection changed.
    Len,
    /// The key set or iteration order changed.
    Iterate,
}

/// A notification describing one change to one property.
///
/// The previous and new values are carried type-erased; use [`Change::was`]
/// and [`Change::now`] to look at them.
#[derive(Clone)]
pub struct Change {
    pub signal: SignalId,
    pub key: Key,
    pub kind: ChangeKind,
    was: Option<Rc<dyn Any>>,
    now: Option<Rc<dyn Any>>,
}

impl Change {
    pub fn new(signal: SignalId, key: Key, kind: ChangeKind) -> Self {
        Self {
            signal,
            key,
            kind,
            was: None,
            now: None,
        }
    }

    /// Attach the value the property held before the change.
    pub fn with_was<V: 'static>(mut self, was: V) -> Self {
        self.was = Some(Rc::new(was));
        self
    }

    /// Attach the value the property holds after the change.
    pub fn with_now<V: 'static>(mut self, now: V) -> Self {
        self.now = Some(Rc::new(now));
        self
    }

    /// The previous value, if it was recorded and has type `V`.
    pub fn was<V: 'static>(&self) -> Option<&V> {
        self.was.as_deref().and_then(|v| v.downcast_ref())
    }

    /// The new value, if it was recorded and has type `V`.
    pub fn now<V: 'static>(&self) -> Option<&V> {
        self.now.as_deref().and_then(|v| v.downcast_ref())
    }
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change")
            .field("signal", &self.signal)
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
