//! Reactive Context
//!
//! The reactive context tracks which computations are currently running.
//! This enables automatic dependency tracking: when a signal is read, the
//! computation on top of the compute stack becomes a subscriber.
//!
//! # Implementation
//!
//! Two parallel stacks live inside the `Runtime`:
//!
//! - the compute stack, holding the running computations
//! - the signal stack, holding their result signals
//!
//! Entering a run pushes onto both; the returned [`Frame`] pops both when it
//! is dropped, so the stacks stay balanced even if the computation fails or
//! panics. The signal stack is what cycle detection consults: a computation
//! whose result signal is already on it is being re-triggered by its own
//! unfinished output.

use std::cell::RefCell;
use std::mem;

use smallvec::SmallVec;

use crate::graph::{ComputationId, SignalId};

type Stack<T> = SmallVec<[T; 8]>;

/// The compute and signal stacks.
#[derive(Debug, Default)]
pub(crate) struct Stacks {
    computations: Stack<ComputationId>,
    signals: Stack<SignalId>,
}

impl Stacks {
    /// The computation that reads are attributed to, if any.
    pub(crate) fn current(&self) -> Option<ComputationId> {
        self.computations.last().copied()
    }

    /// Whether `signal` belongs to a computation that is still running.
    pub(crate) fn holds_signal(&self, signal: SignalId) -> bool {
        self.signals.contains(&signal)
    }

    pub(crate) fn computations(&self) -> &[ComputationId] {
        &self.computations
    }

    pub(crate) fn signals(&self) -> &[SignalId] {
        &self.signals
    }
}

/// Guard for one running computation. Pops both stacks on drop.
pub(crate) struct Frame<'a> {
    stacks: &'a RefCell<Stacks>,
    computation: ComputationId,
}

impl<'a> Frame<'a> {
    pub(crate) fn enter(
        stacks: &'a RefCell<Stacks>,
        computation: ComputationId,
        result: SignalId,
    ) -> Self {
        let mut guard = stacks.borrow_mut();
        guard.computations.push(computation);
        guard.signals.push(result);
        drop(guard);

        Self {
            stacks,
            computation,
        }
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let mut stacks = self.stacks.borrow_mut();
        let popped = stacks.computations.pop();
        stacks.signals.pop();

        debug_assert_eq!(
            popped,
            Some(self.computation),
            "Frame mismatch: expected {:?}, got {:?}",
            self.computation,
            popped
        );
    }
}

/// Guard that empties the compute stack and restores it on drop.
///
/// The signal stack is left in place so cycle detection keeps working inside
/// an untracked section.
pub(crate) struct Suspended<'a> {
    stacks: &'a RefCell<Stacks>,
    saved: Stack<ComputationId>,
}

impl<'a> Suspended<'a> {
    pub(crate) fn enter(stacks: &'a RefCell<Stacks>) -> Self {
        let saved = mem::take(&mut stacks.borrow_mut().computations);
        Self { stacks, saved }
    }
}

impl Drop for Suspended<'_> {
    fn drop(&mut self) {
        let mut stacks = self.stacks.borrow_mut();
        debug_assert!(
            stacks.computations.is_empty(),
            "unbalanced compute stack inside untracked section"
        );
        stacks.computations = mem::take(&mut self.saved);
    }
}
