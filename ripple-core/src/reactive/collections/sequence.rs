//! Ordered sequences.
//!
//! Positions are properties ([`Key::Index`]). Mutators report
//!
//! - `Set` for every position whose element changed,
//! - `Add` / `Delete` for positions that appeared or disappeared,
//! - `Len` when the length changed,
//! - `Iterate` when the shape changed (length or order).
//!
//! Edits at the tail or at one position know which positions they touch and
//! report them directly. Edits that can shift or reorder elements go through
//! the instrumented path: the sequence is snapshotted, mutated, and compared
//! with the snapshot.

use std::cmp::Ordering;

use crate::error::Result;
use crate::graph::{Change, ChangeKind, Key};
use crate::reactive::signal::Signal;

impl<T: Clone + PartialEq + 'static> Signal<Vec<T>> {
    /// Tracked read of the element at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.read(Key::Index(index), |items| items.get(index).cloned())
    }

    /// Tracked length.
    pub fn len(&self) -> usize {
        self.read(Key::Len, Vec::len)
    }

    /// Whether the sequence is empty. Tracks the length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the whole sequence. Tracks the shape and every position.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter_with(<[T]>::to_vec)
    }

    /// Run `f` over the whole sequence. Tracks the shape and every position.
    pub fn iter_with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.track(Key::Iterate);
        self.track(Key::Len);
        self.peek(|items| {
            for index in 0..items.len() {
                self.track(Key::Index(index));
            }
            f(items.as_slice())
        })
    }

    /// Replace the element at `index`. Setting at `len()` appends.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        let was = {
            let mut items = self.container().borrow_mut();
            if index == items.len() {
                drop(items);
                return self.push(value);
            }
            if items[index] == value {
                return Ok(());
            }
            std::mem::replace(&mut items[index], value.clone())
        };
        self.notify_all(vec![self
            .change(Key::Index(index), ChangeKind::Set)
            .with_was(was)
            .with_now(value)])
    }

    /// Append one element.
    pub fn push(&self, value: T) -> Result<()> {
        self.extend([value])
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<T>> {
        let (popped, len) = {
            let mut items = self.container().borrow_mut();
            (items.pop(), items.len())
        };
        let Some(was) = popped else {
            return Ok(None);
        };
        self.notify_all(self.shrunk(len, vec![was.clone()]))?;
        Ok(Some(was))
    }

    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        self.instrumented(true, |items| items.insert(index, value))
    }

    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&self, index: usize) -> Result<T> {
        self.instrumented(true, |items| items.remove(index))
    }

    /// Remove every element.
    pub fn clear(&self) -> Result<()> {
        self.truncate(0)
    }

    /// Keep the first `len` elements.
    pub fn truncate(&self, len: usize) -> Result<()> {
        let removed: Vec<T> = {
            let mut items = self.container().borrow_mut();
            let len = len.min(items.len());
            items.drain(len..).collect()
        };
        if removed.is_empty() {
            return Ok(());
        }
        self.notify_all(self.shrunk(len, removed))
    }

    /// Append every element of `values`.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) -> Result<()> {
        let (start, added) = {
            let mut items = self.container().borrow_mut();
            let start = items.len();
            items.extend(values);
            (start, items[start..].to_vec())
        };
        if added.is_empty() {
            return Ok(());
        }

        let end = start + added.len();
        let mut changes: Vec<Change> = added
            .into_iter()
            .enumerate()
            .map(|(offset, now)| {
                self.change(Key::Index(start + offset), ChangeKind::Add)
                    .with_now(now)
            })
            .collect();
        changes.push(self.resized(start, end));
        changes.push(self.change(Key::Iterate, ChangeKind::Iterate));
        self.notify_all(changes)
    }

    /// Keep only the elements for which `keep` returns true.
    pub fn retain(&self, keep: impl FnMut(&T) -> bool) -> Result<()> {
        self.instrumented(true, |items| items.retain(keep))
    }

    /// Sort in ascending order.
    pub fn sort(&self) -> Result<()>
    where
        T: Ord,
    {
        self.instrumented(true, |items| items.sort())
    }

    /// Sort with a comparator.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Result<()> {
        self.instrumented(true, |items| items.sort_by(compare))
    }

    /// Reverse the order in place.
    pub fn reverse(&self) -> Result<()> {
        self.instrumented(true, |items| items.reverse())
    }

    /// Swap the elements at `a` and `b`.
    pub fn swap(&self, a: usize, b: usize) -> Result<()> {
        self.instrumented(true, |items| items.swap(a, b))
    }

    /// Arbitrary in-place edit, diffed like every other mutator.
    pub fn mutate_all<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> Result<R> {
        self.instrumented(true, f)
    }

    fn instrumented<R>(&self, reorders: bool, f: impl FnOnce(&mut Vec<T>) -> R) -> Result<R> {
        let (out, changes) = {
            let mut items = self.container().borrow_mut();
            let before = items.clone();
            let out = f(&mut *items);
            (out, self.diff(&before, items.as_slice(), reorders))
        };
        self.notify_all(changes)?;
        Ok(out)
    }

    /// Changes for elements removed from the tail, where `len` is the new
    /// length and `removed` holds the old elements from `len` onward.
    fn shrunk(&self, len: usize, removed: Vec<T>) -> Vec<Change> {
        let end = len + removed.len();
        let mut changes: Vec<Change> = removed
            .into_iter()
            .enumerate()
            .map(|(offset, was)| {
                self.change(Key::Index(len + offset), ChangeKind::Delete)
                    .with_was(was)
            })
            .collect();
        changes.push(self.resized(end, len));
        changes.push(self.change(Key::Iterate, ChangeKind::Iterate));
        changes
    }

    fn resized(&self, was: usize, now: usize) -> Change {
        self.change(Key::Len, ChangeKind::Len)
            .with_was(was)
            .with_now(now)
    }

    fn diff(&self, before: &[T], after: &[T], reorders: bool) -> Vec<Change> {
        let mut changes = Vec::new();
        for index in 0..before.len().max(after.len()) {
            let change = match (before.get(index), after.get(index)) {
                (Some(was), Some(now)) if was != now => self
                    .change(Key::Index(index), ChangeKind::Set)
                    .with_was(was.clone())
                    .with_now(now.clone()),
                (None, Some(now)) => self
                    .change(Key::Index(index), ChangeKind::Add)
                    .with_now(now.clone()),
                (Some(was), None) => self
                    .change(Key::Index(index), ChangeKind::Delete)
                    .with_was(was.clone()),
                _ => continue,
            };
            changes.push(change);
        }

        let resized = before.len() != after.len();
        if resized {
            changes.push(self.resized(before.len(), after.len()));
        }
        if resized || (reorders && !changes.is_empty()) {
            changes.push(self.change(Key::Iterate, ChangeKind::Iterate));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::{ChangeKind, Key, Runtime};

    #[test]
    fn push_notifies_length_and_new_position() {
        let rt = Runtime::new();
        let seq = rt.signal(vec![1, 2]);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (reader, sink) = (seq.clone(), log.clone());
        rt.effect(move |scope| {
            sink.borrow_mut()
                .extend(scope.changes().iter().map(|c| (c.key.clone(), c.kind)));
            Ok((reader.len(), reader.get(2)))
        })
        .unwrap();

        seq.push(3).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                (Key::Index(2), ChangeKind::Add),
                (Key::Len, ChangeKind::Len)
            ]
        );
    }

    #[test]
    fn position_readers_ignore_other_positions() {
        let rt = Runtime::new();
        let seq = rt.signal(vec!["a", "b", "c"]);
        let runs = Rc::new(Cell::new(0));

        let (reader, counter) = (seq.clone(), runs.clone());
        let first = rt
            .effect(move |_| {
                counter.set(counter.get() + 1);
                Ok(reader.get(0))
            })
            .unwrap();

        seq.set(2, "z").unwrap();
        seq.push("d").unwrap();
        assert_eq!(runs.get(), 1);

        seq.set(0, "y").unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(first.value(), Some(Some("y")));

        // Equal value: no change.
        seq.set(0, "y").unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn bulk_mutators_rerun_once() {
        let rt = Runtime::new();
        let seq = rt.signal(vec![3, 1, 2]);
        let runs = Rc::new(Cell::new(0));

        let (reader, counter) = (seq.clone(), runs.clone());
        let snapshot = rt
            .effect(move |_| {
                counter.set(counter.get() + 1);
                Ok(reader.to_vec())
            })
            .unwrap();

        seq.sort().unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(snapshot.value(), Some(vec![1, 2, 3]));

        // Already sorted: nothing to report.
        seq.sort().unwrap();
        assert_eq!(runs.get(), 2);

        seq.retain(|n| n % 2 == 1).unwrap();
        assert_eq!(runs.get(), 3);
        assert_eq!(snapshot.value(), Some(vec![1, 3]));
    }

    #[test]
    fn pop_and_remove_return_elements() {
        let rt = Runtime::new();
        let seq = rt.signal(vec![1, 2, 3, 4]);

        let reader = seq.clone();
        let len = rt.effect(move |_| Ok(reader.len())).unwrap();

        assert_eq!(seq.pop().unwrap(), Some(4));
        assert_eq!(seq.remove(0).unwrap(), 1);
        assert_eq!(len.value(), Some(2));

        seq.clear().unwrap();
        assert_eq!(seq.pop().unwrap(), None);
        assert!(seq.is_empty());
    }

    #[test]
    fn tail_edits_report_only_touched_positions() {
        let rt = Runtime::new();
        let seq = rt.signal(vec![10, 20, 30, 40]);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (reader, sink) = (seq.clone(), log.clone());
        rt.effect(move |scope| {
            sink.borrow_mut().extend(scope.changes().iter().map(|c| {
                let was = c.was::<i32>().copied().or(c.was::<usize>().map(|n| *n as i32));
                let now = c.now::<i32>().copied().or(c.now::<usize>().map(|n| *n as i32));
                (c.key.clone(), c.kind, was, now)
            }));
            Ok((reader.to_vec(), reader.get(2), reader.get(3)))
        })
        .unwrap();

        seq.truncate(2).unwrap();
        assert_eq!(
            std::mem::take(&mut *log.borrow_mut()),
            vec![
                (Key::Index(2), ChangeKind::Delete, Some(30), None),
                (Key::Index(3), ChangeKind::Delete, Some(40), None),
                (Key::Len, ChangeKind::Len, Some(4), Some(2)),
                (Key::Iterate, ChangeKind::Iterate, None, None),
            ]
        );

        seq.set(1, 21).unwrap();
        assert_eq!(
            std::mem::take(&mut *log.borrow_mut()),
            vec![(Key::Index(1), ChangeKind::Set, Some(20), Some(21))]
        );

        seq.extend([50, 60]).unwrap();
        assert_eq!(
            std::mem::take(&mut *log.borrow_mut()),
            vec![
                (Key::Index(2), ChangeKind::Add, None, Some(50)),
                (Key::Index(3), ChangeKind::Add, None, Some(60)),
                (Key::Len, ChangeKind::Len, Some(2), Some(4)),
                (Key::Iterate, ChangeKind::Iterate, None, None),
            ]
        );

        // Nothing to remove or append: silent.
        seq.truncate(10).unwrap();
        seq.extend(Vec::new()).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn set_at_length_appends() {
        let rt = Runtime::new();
        let seq = rt.signal(Vec::<u8>::new());

        seq.set(0, 9).unwrap();
        seq.extend([1, 2]).unwrap();
        seq.insert(1, 5).unwrap();
        seq.swap(0, 3).unwrap();
        seq.reverse().unwrap();
        assert_eq!(seq.to_vec(), vec![9, 1, 5, 2]);

        let taken = seq
            .mutate_all(|items| items.drain(..2).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(taken, vec![9, 1]);
        assert_eq!(seq.to_vec(), vec![5, 2]);

        seq.truncate(1).unwrap();
        seq.sort_by(|a, b| b.cmp(a)).unwrap();
        assert_eq!(seq.to_vec(), vec![5]);
    }
}
