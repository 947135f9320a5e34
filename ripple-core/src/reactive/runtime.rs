//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and
//! computations. It owns the dependency graph, the compute/signal stacks,
//! the signal registry, the batch state, and the timer agenda.
//!
//! # How It Works
//!
//! 1. Wrapping a container registers its signal, keyed by container identity.
//!
//! 2. When a running computation reads a property, the runtime records the
//!    edge `(signal, key) -> computation`.
//!
//! 3. When a property changes, the runtime:
//!    a. Finds the subscribers of that property
//!    b. Marks each one dirty and hands it the change
//!    c. Inside a batch, parks them until the batch closes
//!    d. Otherwise triggers every subscriber that is still dirty, in order
//!
//! # Ownership
//!
//! There is no global state. Each application (or each test) constructs its
//! own `Runtime`; cloning a `Runtime` clones a handle to the same state.
//! Everything is single-threaded: the runtime is neither `Send` nor `Sync`.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::graph::{Change, ComputationId, ContainerId, DependencyGraph, Key, SignalId};

use super::batch::BatchState;
use super::context::Stacks;
use super::effect::Computation;
use super::signal::{Container, Signal, SignalInner};
use super::timer::Agenda;

pub(crate) type Retained = HashMap<SignalId, Rc<dyn Any>>;

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) graph: RefCell<DependencyGraph>,
    pub(crate) stacks: RefCell<Stacks>,
    pub(crate) computations: RefCell<HashMap<ComputationId, Rc<Computation>>>,
    /// Result signal -> the computation that produces it.
    pub(crate) owners: RefCell<HashMap<SignalId, ComputationId>>,
    pub(crate) batch: RefCell<BatchState>,
    pub(crate) agenda: RefCell<Agenda>,
    registry: RefCell<HashMap<ContainerId, Weak<dyn Any>>>,
    /// Signals read by each computation's last run, kept alive so their
    /// identity (and the edges pointing at it) survives dropped handles.
    retained: RefCell<HashMap<ComputationId, Retained>>,
}

impl RuntimeInner {
    /// Record a read against the computation on top of the compute stack.
    pub(crate) fn track(&self, signal: SignalId, key: Key, retain: impl FnOnce() -> Rc<dyn Any>) {
        let Some(current) = self.stacks.borrow().current() else {
            return;
        };
        // A computation destroyed mid-run keeps running; its later reads go nowhere.
        if !self.computations.borrow().contains_key(&current) {
            return;
        }
        trace!(computation = ?current, signal = ?signal, key = %key, "recorded read");
        self.graph.borrow_mut().record_read(current, signal, key);
        self.retained
            .borrow_mut()
            .entry(current)
            .or_default()
            .entry(signal)
            .or_insert_with(retain);
    }

    /// Drop every edge of `computation`. The signals it held are handed back
    /// so the caller decides when they may be released: dropping one can call
    /// back into the registry.
    pub(crate) fn forget_reads(&self, computation: ComputationId) -> Retained {
        let released = self.retained.borrow_mut().remove(&computation);
        self.graph.borrow_mut().clear_edges(computation);
        released.unwrap_or_default()
    }

    /// Forget a signal that is being dropped.
    ///
    /// May run while other runtime state is borrowed (a signal can drop from
    /// inside a computation), so it backs off instead of panicking.
    pub(crate) fn release_signal(&self, signal: SignalId, container: ContainerId) {
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            if registry
                .get(&container)
                .is_some_and(|weak| weak.strong_count() == 0)
            {
                registry.remove(&container);
            }
        }
        if let Ok(mut graph) = self.graph.try_borrow_mut() {
            graph.forget_signal(signal);
        }
    }
}

/// Handle to a reactive runtime.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Runtime, Record};
///
/// let rt = Runtime::new();
/// let a = rt.signal(Record::from([("x".to_string(), 1)]));
///
/// let reader = a.clone();
/// let e1 = rt.effect(move |_| Ok(reader.get("x").unwrap_or(0) + 1)).unwrap();
///
/// let e1_result = e1.clone();
/// let e2 = rt.effect(move |_| Ok(e1_result.value().unwrap_or(0) * 10)).unwrap();
///
/// a.insert("x", 4).unwrap();
/// assert_eq!(e1.value(), Some(5));
/// assert_eq!(e2.value(), Some(50));
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with an explicit configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(?config, "creating reactive runtime");
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(DependencyGraph::new()),
                stacks: RefCell::new(Stacks::default()),
                computations: RefCell::new(HashMap::new()),
                owners: RefCell::new(HashMap::new()),
                batch: RefCell::new(BatchState::default()),
                agenda: RefCell::new(Agenda::default()),
                registry: RefCell::new(HashMap::new()),
                retained: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Return the signal for `container`, creating it on first use.
    ///
    /// Wrapping the same container again returns the same signal for as long
    /// as any handle to it is alive.
    pub fn wrap<T: 'static>(&self, container: &Container<T>) -> Signal<T> {
        let id = container.id();
        let existing = self
            .inner
            .registry
            .borrow()
            .get(&id)
            .and_then(Weak::upgrade);

        if let Some(existing) = existing {
            if let Ok(inner) = existing.downcast::<SignalInner<T>>() {
                return Signal::from_inner(inner);
            }
        }

        let signal = Signal::attach(&self.inner, container.clone());
        trace!(signal = ?signal.id(), container = ?id, "wrapped container");
        self.inner
            .registry
            .borrow_mut()
            .insert(id, signal.downgrade_any());
        signal
    }

    /// Wrap a fresh container holding `value`.
    pub fn signal<T: 'static>(&self, value: T) -> Signal<T> {
        self.wrap(&Container::new(value))
    }

    /// Deliver `change` to every computation subscribed to its property.
    pub(crate) fn notify(&self, change: Change) -> Result<()> {
        let listeners = self
            .inner
            .graph
            .borrow()
            .listeners_for(change.signal, &change.key);
        if listeners.is_empty() {
            return Ok(());
        }

        trace!(
            signal = ?change.signal,
            key = %change.key,
            kind = ?change.kind,
            listeners = listeners.len(),
            "notify"
        );

        let woken: SmallVec<[Rc<Computation>; 4]> = listeners
            .into_iter()
            .filter_map(|id| self.computation(id))
            .collect();
        for computation in &woken {
            computation.mark_dirty(change.clone());
        }

        if self.is_batching() {
            self.park(woken.iter().map(|computation| computation.id));
            return Ok(());
        }

        // A computation re-run earlier in this wave may already have brought
        // a later one up to date; only the ones still dirty run.
        for computation in &woken {
            if computation.is_dirty() {
                self.trigger(computation)?;
            }
        }
        Ok(())
    }

    pub(crate) fn computation(&self, id: ComputationId) -> Option<Rc<Computation>> {
        self.inner.computations.borrow().get(&id).cloned()
    }

    pub(crate) fn owner_of(&self, result: SignalId) -> Option<ComputationId> {
        self.inner.owners.borrow().get(&result).copied()
    }

    /// Number of computations subscribed to `key` on `signal`.
    pub fn listener_count<T: 'static>(&self, signal: &Signal<T>, key: impl Into<Key>) -> usize {
        self.inner
            .graph
            .borrow()
            .listener_count(signal.id(), &key.into())
    }

    /// Number of properties the computation behind `result` currently reads.
    pub fn dependency_count<T: 'static>(&self, result: &Signal<T>) -> usize {
        self.owner_of(result.id())
            .map_or(0, |id| self.inner.graph.borrow().dependency_count(id))
    }

    /// Number of live computations.
    pub fn computation_count(&self) -> usize {
        self.inner.computations.borrow().len()
    }

    /// Number of dependency edges across all computations.
    pub fn edge_count(&self) -> usize {
        self.inner.graph.borrow().edge_count()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("computations", &self.computation_count())
            .field("edges", &self.edge_count())
            .field("batch_depth", &self.batch_depth())
            .finish()
    }
}
