//! Sets.
//!
//! Membership has no per-element property: every read tracks the key set
//! ([`Key::Iterate`]) or the size ([`Key::Len`]), and every mutation that
//! changes the size notifies both.

use std::hash::Hash;

use indexmap::{Equivalent, IndexSet};

use crate::error::Result;
use crate::graph::{ChangeKind, Key};
use crate::reactive::signal::Signal;

impl<T: Hash + Eq + Clone + 'static> Signal<IndexSet<T>> {
    /// Membership test. Tracks the member set.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<T>,
    {
        self.read(Key::Iterate, |set| set.contains(value))
    }

    /// Tracked number of members.
    pub fn len(&self) -> usize {
        self.read(Key::Len, |set| set.len())
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Members in insertion order.
    pub fn to_vec(&self) -> Vec<T> {
        self.read(Key::Iterate, |set| set.iter().cloned().collect())
    }

    /// Add `value`. Returns whether it was new.
    pub fn insert(&self, value: T) -> Result<bool> {
        self.resize(|set| set.insert(value))
    }

    /// Remove `value`, keeping the order of the other members.
    pub fn remove<Q>(&self, value: &Q) -> Result<bool>
    where
        Q: ?Sized + Hash + Equivalent<T>,
    {
        self.resize(|set| set.shift_remove(value))
    }

    /// Remove every member.
    pub fn clear(&self) -> Result<()> {
        self.resize(IndexSet::clear)
    }

    /// Keep only the members for which `keep` returns true.
    pub fn retain(&self, keep: impl FnMut(&T) -> bool) -> Result<()> {
        self.resize(|set| set.retain(keep))
    }

    /// Add every member of `values`.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) -> Result<()> {
        self.resize(|set| set.extend(values))
    }

    fn resize<R>(&self, f: impl FnOnce(&mut IndexSet<T>) -> R) -> Result<R> {
        let (out, before, after) = {
            let mut set = self.container().borrow_mut();
            let before = set.len();
            let out = f(&mut *set);
            (out, before, set.len())
        };

        if before != after {
            self.notify_all(vec![
                self.change(Key::Len, ChangeKind::Len)
                    .with_was(before)
                    .with_now(after),
                self.change(Key::Iterate, ChangeKind::Iterate),
            ])?;
        }
        Ok(out)
    }
}
