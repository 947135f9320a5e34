//! Reactive Primitives
//!
//! This module implements the reactive system: signals over caller-owned
//! containers, effects that re-run when what they read changes, and the
//! runtime that connects the two.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] wraps a [`Container`] and turns property access into tracked
//! reads and property writes into change notifications. Signals are memoized
//! per container and per runtime.
//!
//! ## Effects
//!
//! An effect is a computation that runs once on creation and again whenever
//! one of the properties it read changes. Its return value lands in a result
//! signal, so other effects can depend on it. Throttled and clock-gated
//! variants change *when* a triggered effect re-runs, not *whether*.
//!
//! ## Batches
//!
//! [`Runtime::batch`] coalesces notifications so that every affected effect
//! runs at most once per batch.
//!
//! # Implementation Notes
//!
//! Tracking is automatic: every read checks the runtime's compute stack and,
//! if a computation is running, records an edge for the property. Every run
//! starts by dropping the computation's old edges, so branches that are no
//! longer taken stop causing re-runs.

mod batch;
mod clock;
mod collections;
mod context;
mod effect;
mod runtime;
mod signal;
mod throttle;
mod timer;

pub use clock::Tick;
pub use collections::Record;
pub use effect::{EffectFn, Scope};
pub use runtime::Runtime;
pub use signal::{Container, Signal};
