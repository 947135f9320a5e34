//! Effect Implementation
//!
//! An Effect is a re-runnable computation. It runs once when created and
//! again whenever a property it read during its previous run changes. Every
//! effect owns a result signal holding the value its function last returned,
//! so effects compose: one effect may read another's result.
//!
//! # The Run Algorithm
//!
//! 1. If the computation's result signal is on the signal stack, fail with
//!    [`Error::CyclicDependency`]: it is being triggered by its own output.
//!
//! 2. Clear every dependency edge of the computation.
//!
//! 3. Push the computation and its result signal onto the stacks.
//!
//! 4. Invoke the function with a [`Scope`].
//!
//! 5. Pop both stacks, whether the function succeeded, failed, or panicked.
//!
//! 6. Assign the returned value to the result signal. A deferred result is
//!    queued on the runtime and assigned when it settles.
//!
//! A failing run leaves the computation with no edges at all, including
//! edges for reads made before the failure: it stays unsubscribed until it
//! is re-run explicitly.
//!
//! # Deferred Results
//!
//! [`Runtime::effect_async`] takes a function that returns a future. The
//! synchronous call collects dependencies; the future runs later, outside
//! tracking, and its output becomes the result value. Reads performed inside
//! the future are never tracked.
//!
//! # Recursion
//!
//! Every effect function carries an active flag. Invoking a function that is
//! already executing anywhere on the call stack fails with
//! [`Error::RecursiveCall`], even when no true dependency cycle exists.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::{Change, ComputationId, SignalId};

use super::clock::ClockState;
use super::context::Frame;
use super::runtime::Runtime;
use super::signal::Signal;
use super::throttle::ThrottleState;

// ----------------------------------------------------------------------------
// Effect functions
// ----------------------------------------------------------------------------

pub(crate) enum Step<T> {
    Ready(T),
    Deferred(LocalBoxFuture<'static, T>),
}

type BoxedFn<T> = Box<dyn FnMut(&Scope<'_>) -> Result<Step<T>>>;

/// A shareable effect function.
///
/// Most callers pass closures straight to [`Runtime::effect`]. An `EffectFn`
/// is useful when the same function backs several effects, since the
/// recursion guard is attached to the function, not to the effect.
pub struct EffectFn<T: 'static> {
    inner: Rc<EffectFnInner<T>>,
}

struct EffectFnInner<T> {
    active: Cell<bool>,
    f: RefCell<BoxedFn<T>>,
}

/// Resets the active flag when the call ends.
struct ActiveGuard<'a>(&'a Cell<bool>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: 'static> EffectFn<T> {
    /// Wrap a synchronous function.
    pub fn new<F>(mut f: F) -> Self
    where
        F: FnMut(&Scope<'_>) -> Result<T> + 'static,
    {
        Self::from_boxed(Box::new(move |scope: &Scope<'_>| {
            f(scope).map(Step::Ready)
        }))
    }

    /// Wrap a function whose result settles later.
    ///
    /// Only reads made before the future is returned are tracked.
    pub fn deferred<F, Fut>(mut f: F) -> Self
    where
        F: FnMut(&Scope<'_>) -> Result<Fut> + 'static,
        Fut: Future<Output = T> + 'static,
    {
        Self::from_boxed(Box::new(move |scope: &Scope<'_>| {
            f(scope).map(|future| Step::Deferred(future.boxed_local()))
        }))
    }

    fn from_boxed(f: BoxedFn<T>) -> Self {
        Self {
            inner: Rc::new(EffectFnInner {
                active: Cell::new(false),
                f: RefCell::new(f),
            }),
        }
    }

    /// Whether the function is executing right now.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    fn call(&self, scope: &Scope<'_>) -> Result<Step<T>> {
        if self.inner.active.replace(true) {
            warn!(computation = ?scope.id(), "recursive call of effect function");
            return Err(Error::RecursiveCall {
                computation: scope.id(),
            });
        }
        let _active = ActiveGuard(&self.inner.active);
        let mut f = self.inner.f.borrow_mut();
        (&mut **f)(scope)
    }
}

impl<T: 'static> Clone for EffectFn<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> std::fmt::Debug for EffectFn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectFn")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Scope
// ----------------------------------------------------------------------------

/// What an effect function sees while it runs.
pub struct Scope<'a> {
    runtime: &'a Runtime,
    computation: ComputationId,
    result: SignalId,
    runs: u64,
    changes: &'a [Change],
}

impl<'a> Scope<'a> {
    /// The runtime, for creating nested effects or batches.
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// The running computation.
    pub fn id(&self) -> ComputationId {
        self.computation
    }

    /// The result signal of the running computation.
    pub fn result_id(&self) -> SignalId {
        self.result
    }

    /// How many runs completed before this one.
    pub fn run_count(&self) -> u64 {
        self.runs
    }

    /// The changes that triggered this run. Empty on the first run.
    pub fn changes(&self) -> &[Change] {
        self.changes
    }

    /// Snapshot of the compute stack, outermost first.
    pub fn compute_stack(&self) -> Vec<ComputationId> {
        self.runtime.inner().stacks.borrow().computations().to_vec()
    }

    /// Snapshot of the signal stack, outermost first.
    pub fn signal_stack(&self) -> Vec<SignalId> {
        self.runtime.inner().stacks.borrow().signals().to_vec()
    }

    /// Number of computations currently running, this one included.
    pub fn depth(&self) -> usize {
        self.runtime.inner().stacks.borrow().signals().len()
    }
}

// ----------------------------------------------------------------------------
// Computations
// ----------------------------------------------------------------------------

/// How a computation reacts when one of its dependencies changes.
pub(crate) enum Policy {
    Eager,
    Throttled(ThrottleState),
    Clock(ClockState),
}

#[derive(Clone, Copy)]
enum Gate {
    Eager,
    Throttled,
    Clock,
}

impl Policy {
    fn gate(&self) -> Gate {
        match self {
            Policy::Eager => Gate::Eager,
            Policy::Throttled(_) => Gate::Throttled,
            Policy::Clock(_) => Gate::Clock,
        }
    }
}

/// What to do with a run's output once the stacks are popped.
pub(crate) enum Completion {
    Assign(Box<dyn FnOnce() -> Result<()>>),
    Defer(LocalBoxFuture<'static, Result<()>>),
}

type Body = Box<dyn Fn(&Scope<'_>) -> Result<Completion>>;

pub(crate) struct Computation {
    pub(crate) id: ComputationId,
    pub(crate) result: SignalId,
    dirty: Cell<bool>,
    changes: RefCell<Vec<Change>>,
    runs: Cell<u64>,
    pub(crate) policy: RefCell<Policy>,
    body: Body,
}

impl Computation {
    pub(crate) fn mark_dirty(&self, change: Change) {
        self.changes.borrow_mut().push(change);
        self.dirty.set(true);
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Acknowledge a trigger without running; pending changes are kept.
    pub(crate) fn hold(&self) {
        self.dirty.set(false);
    }

    /// Acknowledge a trigger and drop the pending changes.
    pub(crate) fn discard(&self) {
        self.dirty.set(false);
        self.changes.borrow_mut().clear();
    }

    pub(crate) fn has_changes(&self, mut relevant: impl FnMut(&Change) -> bool) -> bool {
        self.changes.borrow().iter().any(&mut relevant)
    }
}

// ----------------------------------------------------------------------------
// Engine
// ----------------------------------------------------------------------------

impl Runtime {
    /// Create an effect from `f` and run it once.
    ///
    /// The returned signal holds the value of the latest run.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ripple_core::{Runtime, Record};
    ///
    /// let rt = Runtime::new();
    /// let s = rt.signal(Record::from([("v".to_string(), 1)]));
    ///
    /// let reader = s.clone();
    /// let r = rt.effect(move |_| Ok(reader.get("v").unwrap_or(0) * 2)).unwrap();
    /// assert_eq!(r.value(), Some(2));
    ///
    /// s.insert("v", 5).unwrap();
    /// assert_eq!(r.value(), Some(10));
    /// ```
    pub fn effect<T, F>(&self, f: F) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
        F: FnMut(&Scope<'_>) -> Result<T> + 'static,
    {
        self.spawn(EffectFn::new(f), Policy::Eager)
    }

    /// Create an effect backed by a shared [`EffectFn`].
    pub fn effect_with<T>(&self, f: &EffectFn<T>) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
    {
        self.spawn(f.clone(), Policy::Eager)
    }

    /// Create an effect whose function returns a future.
    ///
    /// The result signal stays `None` until the first future settles. Drive
    /// settlement with [`Runtime::settle`].
    pub fn effect_async<T, F, Fut>(&self, f: F) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
        F: FnMut(&Scope<'_>) -> Result<Fut> + 'static,
        Fut: Future<Output = T> + 'static,
    {
        self.spawn(EffectFn::deferred(f), Policy::Eager)
    }

    pub(crate) fn spawn<T>(&self, f: EffectFn<T>, policy: Policy) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
    {
        let result: Signal<Option<T>> = self.signal(None);
        let id = ComputationId::new();

        let output = result.clone();
        let body: Body = Box::new(move |scope: &Scope<'_>| {
            let output = output.clone();
            Ok(match f.call(scope)? {
                Step::Ready(value) => {
                    Completion::Assign(Box::new(move || output.set_value(Some(value)).map(drop)))
                }
                Step::Deferred(future) => Completion::Defer(
                    async move { output.set_value(Some(future.await)).map(drop) }.boxed_local(),
                ),
            })
        });

        let computation = Rc::new(Computation {
            id,
            result: result.id(),
            dirty: Cell::new(false),
            changes: RefCell::new(Vec::new()),
            runs: Cell::new(0),
            policy: RefCell::new(policy),
            body,
        });

        self.inner()
            .computations
            .borrow_mut()
            .insert(id, Rc::clone(&computation));
        self.inner().owners.borrow_mut().insert(result.id(), id);
        debug!(computation = ?id, result = ?result.id(), "created computation");

        if let Err(err) = self.run(&computation) {
            // Nobody holds a handle yet, so a failed first run is discarded.
            self.detach(id, result.id());
            return Err(err);
        }
        Ok(result)
    }

    /// Run `computation` now, regardless of its policy.
    pub(crate) fn run(&self, computation: &Rc<Computation>) -> Result<()> {
        let id = computation.id;
        if self.inner().stacks.borrow().holds_signal(computation.result) {
            warn!(computation = ?id, "cyclic dependency detected");
            return Err(Error::CyclicDependency { computation: id });
        }

        // Held until the run ends, so signals read again keep their identity.
        let _previous = self.inner().forget_reads(id);
        let changes = std::mem::take(&mut *computation.changes.borrow_mut());
        computation.dirty.set(false);
        debug!(computation = ?id, changes = changes.len(), "running computation");

        let outcome = {
            let _frame = Frame::enter(&self.inner().stacks, id, computation.result);
            let scope = Scope {
                runtime: self,
                computation: id,
                result: computation.result,
                runs: computation.runs.get(),
                changes: &changes,
            };
            (computation.body)(&scope)
        };
        computation.runs.set(computation.runs.get() + 1);

        let completion = match outcome {
            Ok(completion) => completion,
            Err(err) => {
                // Reads made before the failure must not keep it subscribed.
                drop(self.inner().forget_reads(id));
                debug!(computation = ?id, error = %err, "computation failed");
                return Err(err);
            }
        };

        match completion {
            Completion::Assign(assign) => assign(),
            Completion::Defer(task) => {
                self.defer(task);
                Ok(())
            }
        }
    }

    /// React to a dependency change according to the computation's policy.
    pub(crate) fn trigger(&self, computation: &Rc<Computation>) -> Result<()> {
        let gate = computation.policy.borrow().gate();
        match gate {
            Gate::Eager => self.run(computation),
            Gate::Throttled => self.throttle_trigger(computation),
            Gate::Clock => self.clock_trigger(computation),
        }
    }

    /// Detach the computation behind `result`.
    ///
    /// Its edges are cleared and its function is released. Signals held by the
    /// caller stay valid; the result simply stops updating.
    pub fn destroy<T: 'static>(&self, result: &Signal<T>) {
        if let Some(id) = self.owner_of(result.id()) {
            debug!(computation = ?id, "destroying computation");
            self.detach(id, result.id());
        }
    }

    fn detach(&self, id: ComputationId, result: SignalId) {
        let released = self.inner().forget_reads(id);
        self.inner().owners.borrow_mut().remove(&result);
        self.unpark(id);
        let removed = self.inner().computations.borrow_mut().remove(&id);
        drop((removed, released));
    }

    /// Re-run the computation behind `result` immediately.
    pub fn rerun<T: 'static>(&self, result: &Signal<T>) -> Result<()> {
        let computation = self
            .owner_of(result.id())
            .and_then(|id| self.computation(id))
            .ok_or(Error::Destroyed)?;
        self.run(&computation)
    }

    /// Whether `result` still has a live computation behind it.
    pub fn is_alive<T: 'static>(&self, result: &Signal<T>) -> bool {
        self.owner_of(result.id()).is_some()
    }

    /// How many times the computation behind `result` has run.
    pub fn run_count<T: 'static>(&self, result: &Signal<T>) -> Option<u64> {
        self.owner_of(result.id())
            .and_then(|id| self.computation(id))
            .map(|computation| computation.runs.get())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
