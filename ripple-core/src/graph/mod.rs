//! Dependency Graph
//!
//! This module implements the index that connects observable properties to
//! the computations that read them.
//!
//! # Overview
//!
//! - Nodes are signals (sources) and computations (subscribers)
//! - Edges connect a computation to one `(signal, key)` property it read
//!
//! When a property changes, we look up its subscribers and hand them to the
//! effect engine. Edges exist only for the run that created them: every run
//! of a computation starts by discarding its edges, so the edge set always
//! equals what the last completed run actually read.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized and owned by a `Runtime`, not spread across
//!    signals. One place to clear, one place to inspect.
//!
//! 2. Both directions are indexed for O(1) amortized lookups.
//!
//! 3. There is no topological sort. Subscribers run in subscription order,
//!    and the dirty flag on each computation keeps a wave from running the
//!    same computation twice.

mod edges;
mod key;
mod node;

pub use edges::{DependencyGraph, Listeners};
pub use key::{Change, ChangeKind, Key, ToKey};
pub use node::{ComputationId, ContainerId, SignalId};
