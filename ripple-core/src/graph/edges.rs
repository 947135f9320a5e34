//! Dependency Edges
//!
//! The edge index is bidirectional:
//!
//! - forward: `(signal, key)` → computations subscribed to that property
//! - reverse: computation → every `(signal, key)` it read during its last run
//!
//! The reverse index is what makes `clear_edges` cheap: a computation drops
//! all of its subscriptions at the start of every run without scanning the
//! forward index.
//!
//! Subscriber sets are insertion-ordered. Within one notification wave,
//! computations run in the order they subscribed.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::key::Key;
use super::node::{ComputationId, SignalId};

/// A snapshot of the subscribers of one property.
pub type Listeners = SmallVec<[ComputationId; 4]>;

type Property = (SignalId, Key);

/// The bidirectional dependency index.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    listeners: HashMap<Property, IndexSet<ComputationId>>,
    reads: HashMap<ComputationId, HashSet<Property>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `computation` read `key` of `signal`.
    pub fn record_read(&mut self, computation: ComputationId, signal: SignalId, key: Key) {
        let property = (signal, key);
        self.listeners
            .entry(property.clone())
            .or_default()
            .insert(computation);
        self.reads.entry(computation).or_default().insert(property);
    }

    /// Remove every edge where `computation` is the subscriber.
    ///
    /// Returns the number of edges removed.
    pub fn clear_edges(&mut self, computation: ComputationId) -> usize {
        let Some(reads) = self.reads.remove(&computation) else {
            return 0;
        };

        let removed = reads.len();
        for property in reads {
            if let Some(subscribers) = self.listeners.get_mut(&property) {
                subscribers.shift_remove(&computation);
                if subscribers.is_empty() {
                    self.listeners.remove(&property);
                }
            }
        }
        removed
    }

    /// Copy of the subscribers of `key` on `signal`.
    ///
    /// Callers may mutate the graph while walking the returned list.
    pub fn listeners_for(&self, signal: SignalId, key: &Key) -> Listeners {
        self.listeners
            .get(&(signal, key.clone()))
            .map(|subscribers| subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop every edge that points at `signal`.
    ///
    /// Called when a signal is dropped so dead properties do not linger.
    pub fn forget_signal(&mut self, signal: SignalId) {
        self.listeners.retain(|(owner, _), _| *owner != signal);
        self.reads.retain(|_, properties| {
            properties.retain(|(owner, _)| *owner != signal);
            !properties.is_empty()
        });
    }

    /// Number of computations subscribed to `key` on `signal`.
    pub fn listener_count(&self, signal: SignalId, key: &Key) -> usize {
        self.listeners
            .get(&(signal, key.clone()))
            .map_or(0, IndexSet::len)
    }

    /// Number of properties `computation` currently depends on.
    pub fn dependency_count(&self, computation: ComputationId) -> usize {
        self.reads.get(&computation).map_or(0, HashSet::len)
    }

    /// Whether `computation` depends on `key` of `signal`.
    pub fn depends_on(&self, computation: ComputationId, signal: SignalId, key: &Key) -> bool {
        self.reads
            .get(&computation)
            .is_some_and(|properties| properties.contains(&(signal, key.clone())))
    }

    /// Total number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.reads.values().map(HashSet::len).sum()
    }
}
