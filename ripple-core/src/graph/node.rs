//! Graph Nodes
//!
//! Identifiers for the two kinds of node that live in the dependency graph:
//! signals (sources) and computations (subscribers). Containers get their own
//! identifier so a signal can be memoized per container identity.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique ID.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw ID value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

node_id! {
    /// Unique identifier for a signal (an observable wrapper).
    SignalId
}

node_id! {
    /// Unique identifier for a computation (an effect and its variants).
    ComputationId
}

node_id! {
    /// Stable handle for a raw container.
    ///
    /// The signal registry is keyed by this handle rather than by address, so
    /// wrapping the same container twice always finds the same signal.
    ContainerId
}
