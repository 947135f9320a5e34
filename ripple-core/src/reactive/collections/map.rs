//! Keyed records and mappings.
//!
//! Each entry is its own property, keyed by [`ToKey::to_key`]. Adding or
//! removing an entry also touches [`Key::Len`] and [`Key::Iterate`], so
//! readers of the size or the key set hear about structural changes while
//! readers of other entries do not.

use std::hash::Hash;

use indexmap::{Equivalent, IndexMap};

use crate::error::Result;
use crate::graph::{Change, ChangeKind, Key, ToKey};
use crate::reactive::signal::{Container, Signal};

impl<K, V> Signal<IndexMap<K, V>>
where
    K: Hash + Eq + ToKey + 'static,
    V: 'static,
{
    /// Tracked read of one entry.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K> + ToKey,
        V: Clone,
    {
        self.read(key.to_key(), |map| map.get(key).cloned())
    }

    /// Existence check. Tracks the entry and the key set.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K> + ToKey,
    {
        self.track(Key::Iterate);
        self.read(key.to_key(), |map| map.contains_key(key))
    }

    /// Tracked number of entries.
    pub fn len(&self) -> usize {
        self.read(Key::Len, |map| map.len())
    }

    /// Whether the map has no entries. Tracks the size.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The keys in insertion order. Tracks the key set only.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.read(Key::Iterate, |map| map.keys().cloned().collect())
    }

    /// The values in insertion order. Tracks the key set and every entry.
    pub fn values(&self) -> Vec<V>
    where
        K: Clone,
        V: Clone,
    {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// The entries in insertion order. Tracks the key set and every entry.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.track(Key::Iterate);
        self.peek(|map| {
            map.iter()
                .map(|(key, value)| {
                    self.track(key.to_key());
                    (key.clone(), value.clone())
                })
                .collect()
        })
    }

    /// Store `value` under `key`. Returns the previous value.
    ///
    /// An equal value is a no-op. A new key also notifies the size and the
    /// key set.
    pub fn insert(&self, key: impl Into<K>, value: V) -> Result<Option<V>>
    where
        V: Clone + PartialEq,
    {
        let key = key.into();
        let prop = key.to_key();

        let (previous, changes) = {
            let mut map = self.container().borrow_mut();
            match map.get_mut(&key) {
                Some(slot) if *slot == value => return Ok(Some(value)),
                Some(slot) => {
                    let was = std::mem::replace(slot, value.clone());
                    let change = self
                        .change(prop, ChangeKind::Set)
                        .with_was(was.clone())
                        .with_now(value);
                    (Some(was), vec![change])
                }
                None => {
                    map.insert(key, value.clone());
                    let changes = vec![
                        self.change(prop, ChangeKind::Add).with_now(value),
                        self.change(Key::Len, ChangeKind::Len),
                        self.change(Key::Iterate, ChangeKind::Iterate),
                    ];
                    (None, changes)
                }
            }
        };

        self.notify_all(changes)?;
        Ok(previous)
    }

    /// Define `key` as a new property, notifying its readers even when an
    /// equal value was already stored.
    pub fn define(&self, key: impl Into<K>, value: V) -> Result<()>
    where
        V: Clone,
    {
        let key = key.into();
        let prop = key.to_key();

        let previous = self.container().borrow_mut().insert(key, value.clone());
        let fresh = previous.is_none();

        let mut add = self.change(prop, ChangeKind::Add).with_now(value);
        if let Some(was) = previous {
            add = add.with_was(was);
        }
        let mut changes = vec![add];
        if fresh {
            changes.push(self.change(Key::Len, ChangeKind::Len));
        }
        changes.push(self.change(Key::Iterate, ChangeKind::Iterate));
        self.notify_all(changes)
    }

    /// Delete `key`, keeping the order of the remaining entries.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        Q: ?Sized + Hash + Equivalent<K> + ToKey,
        V: Clone,
    {
        let removed = self.container().borrow_mut().shift_remove(key);
        let Some(was) = removed else {
            return Ok(None);
        };

        self.notify_all(vec![
            self.change(key.to_key(), ChangeKind::Delete)
                .with_was(was.clone()),
            self.change(Key::Len, ChangeKind::Len),
            self.change(Key::Iterate, ChangeKind::Iterate),
        ])?;
        Ok(Some(was))
    }

    /// Delete every entry.
    pub fn clear(&self) -> Result<()> {
        let drained: Vec<(K, V)> = self.container().borrow_mut().drain(..).collect();
        if drained.is_empty() {
            return Ok(());
        }

        let mut changes: Vec<Change> = drained
            .into_iter()
            .map(|(key, was)| self.change(key.to_key(), ChangeKind::Delete).with_was(was))
            .collect();
        changes.push(self.change(Key::Len, ChangeKind::Len));
        changes.push(self.change(Key::Iterate, ChangeKind::Iterate));
        self.notify_all(changes)
    }
}

impl<K, U> Signal<IndexMap<K, Container<U>>>
where
    K: Hash + Eq + ToKey + 'static,
    U: 'static,
{
    /// Tracked read of a container-valued entry, returned as its signal.
    pub fn get_signal<Q>(&self, key: &Q) -> Option<Signal<U>>
    where
        Q: ?Sized + Hash + Equivalent<K> + ToKey,
    {
        self.get(key).map(|container| self.wrap_child(container))
    }

    /// Store a container (or the container behind a signal) under `key`.
    pub fn insert_signal(
        &self,
        key: impl Into<K>,
        value: impl Into<Container<U>>,
    ) -> Result<Option<Container<U>>> {
        self.insert(key, value.into())
    }
}
