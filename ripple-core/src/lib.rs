//! Ripple Core
//!
//! A fine-grained reactive state runtime. It provides:
//!
//! - Observable wrappers over plain containers (records, mappings,
//!   sequences, sets, and arbitrary structs through lenses)
//! - Per-property dependency tracking
//! - Effects with eager, throttled, and clock-gated re-run policies
//! - Batching and untracked reads
//!
//! Everything is single-threaded and owned by an explicit [`Runtime`]; there
//! is no global state.
//!
//! # Architecture
//!
//! - `reactive`: signals, effects, batching, timers, collection adapters
//! - `graph`: the property-level dependency index and change records
//! - `config`: runtime tuning knobs
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{Record, Runtime};
//!
//! let rt = Runtime::new();
//! let count = rt.signal(Record::from([("n".to_string(), 1)]));
//!
//! let reader = count.clone();
//! let doubled = rt.effect(move |_| Ok(reader.get("n").unwrap_or(0) * 2)).unwrap();
//!
//! let chained = doubled.clone();
//! let label = rt
//!     .effect(move |_| Ok(format!("doubled: {}", chained.value().unwrap_or(0))))
//!     .unwrap();
//!
//! count.insert("n", 5).unwrap();
//! assert_eq!(doubled.value(), Some(10));
//! assert_eq!(label.value().as_deref(), Some("doubled: 10"));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use graph::{Change, ChangeKind, ComputationId, ContainerId, Key, SignalId, ToKey};
pub use indexmap::{IndexMap, IndexSet};
pub use reactive::{Container, EffectFn, Record, Runtime, Scope, Signal, Tick};
