//! Collection Adapters
//!
//! Typed accessors for signals over the three collection shapes:
//!
//! - keyed records and mappings: `Signal<IndexMap<K, V>>`
//! - ordered sequences: `Signal<Vec<T>>`
//! - sets: `Signal<IndexSet<T>>`
//!
//! Every accessor is built on [`Signal::track`](super::Signal::track) and
//! every mutator on [`Signal::notify`](super::Signal::notify), so
//! collections obey the same rules as any other signal. Element reads track
//! the element's key; size reads track [`Key::Len`](crate::Key::Len);
//! enumeration and existence checks track
//! [`Key::Iterate`](crate::Key::Iterate).

use indexmap::IndexMap;

mod map;
mod sequence;
mod set;

/// A keyed record with string keys, the most common observable shape.
pub type Record<V> = IndexMap<String, V>;
