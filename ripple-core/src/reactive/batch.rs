//! Batching and Untracked Reads
//!
//! A batch coalesces the notifications raised inside it. While the batch
//! depth is above zero, notified computations are parked in one pending set
//! instead of running. When the outermost batch closes, the set is drained
//! once: every parked computation that is still dirty runs exactly once, no
//! matter how many of its dependencies changed.
//!
//! [`Runtime::untracked`] is the other escape hatch: it hides the compute
//! stack for the duration of a call, so reads inside it record nothing.

use std::future::Future;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::ComputationId;

use super::context::Suspended;
use super::runtime::Runtime;

#[derive(Debug, Default)]
pub(crate) struct BatchState {
    depth: usize,
    pending: IndexSet<ComputationId>,
}

/// Closes one batch level. If dropped without [`BatchGuard::close`] (a panic
/// or a cancelled future), the depth is still restored; parked computations
/// wait for the next drain.
struct BatchGuard<'a> {
    runtime: &'a Runtime,
    open: bool,
}

impl<'a> BatchGuard<'a> {
    fn enter(runtime: &'a Runtime) -> Self {
        runtime.inner().batch.borrow_mut().depth += 1;
        Self {
            runtime,
            open: true,
        }
    }

    fn close(mut self) -> Result<()> {
        self.open = false;
        if self.runtime.leave_batch() == 0 {
            self.runtime.drain()
        } else {
            Ok(())
        }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.open {
            self.runtime.leave_batch();
        }
    }
}

impl Runtime {
    /// Run `f` with notifications coalesced.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use ripple_core::{Runtime, Record};
    ///
    /// let rt = Runtime::new();
    /// let s = rt.signal(Record::from([("x".to_string(), 1), ("y".to_string(), 2)]));
    /// let runs = Rc::new(Cell::new(0));
    ///
    /// let (reader, counter) = (s.clone(), runs.clone());
    /// rt.effect(move |_| {
    ///     counter.set(counter.get() + 1);
    ///     Ok(reader.get("x").unwrap_or(0) + reader.get("y").unwrap_or(0))
    /// })
    /// .unwrap();
    ///
    /// rt.batch(|| {
    ///     s.insert("x", 10)?;
    ///     s.insert("y", 20)?;
    ///     Ok(())
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(runs.get(), 2);
    /// ```
    pub fn batch<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let guard = BatchGuard::enter(self);
        let out = f();
        let drained = guard.close();
        let out = out?;
        drained?;
        Ok(out)
    }

    /// Like [`Runtime::batch`], but the batch stays open until `future`
    /// resolves, across every suspension point inside it.
    pub async fn batch_async<R, Fut>(&self, future: Fut) -> Result<R>
    where
        Fut: Future<Output = Result<R>>,
    {
        let guard = BatchGuard::enter(self);
        let out = future.await;
        let drained = guard.close();
        let out = out?;
        drained?;
        Ok(out)
    }

    /// Whether a batch is open.
    pub fn is_batching(&self) -> bool {
        self.batch_depth() > 0
    }

    /// Current batch nesting depth.
    pub fn batch_depth(&self) -> usize {
        self.inner().batch.borrow().depth
    }

    /// Run `f` without recording any dependency edges.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _suspended = Suspended::enter(&self.inner().stacks);
        f()
    }

    pub(crate) fn park(&self, ids: impl IntoIterator<Item = ComputationId>) {
        self.inner().batch.borrow_mut().pending.extend(ids);
    }

    pub(crate) fn unpark(&self, id: ComputationId) {
        self.inner().batch.borrow_mut().pending.shift_remove(&id);
    }

    fn leave_batch(&self) -> usize {
        let mut batch = self.inner().batch.borrow_mut();
        batch.depth = batch.depth.saturating_sub(1);
        batch.depth
    }

    fn drain(&self) -> Result<()> {
        let limit = self.config().max_drain_passes;
        let mut passes = 0;

        loop {
            let pending = std::mem::take(&mut self.inner().batch.borrow_mut().pending);
            if pending.is_empty() {
                return Ok(());
            }

            passes += 1;
            if passes > limit {
                warn!(passes, "batch drain limit exceeded");
                return Err(Error::DrainOverflow { passes });
            }
            debug!(pending = pending.len(), pass = passes, "draining batch");

            for id in pending {
                let Some(computation) = self.computation(id) else {
                    continue;
                };
                if computation.is_dirty() {
                    self.trigger(&computation)?;
                }
            }
        }
    }
}
