//! Error types for the reactive runtime.
//!
//! Recursive calls and cyclic dependencies are programmer errors. The runtime
//! never retries them; they propagate to the write or call that triggered the
//! offending run.

use crate::graph::ComputationId;

/// Errors raised by the reactive runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An effect function was invoked while it was already executing.
    #[error("recursive call of effect function (computation {computation:?})")]
    RecursiveCall { computation: ComputationId },

    /// A computation was triggered, directly or transitively, by its own
    /// unfinished output.
    #[error("cyclic dependency detected (computation {computation:?})")]
    CyclicDependency { computation: ComputationId },

    /// The computation behind a result signal has been destroyed.
    #[error("computation has been destroyed")]
    Destroyed,

    /// A batch drain kept producing work past the configured limit.
    #[error("batch drain did not settle after {passes} passes")]
    DrainOverflow { passes: usize },

    /// The runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A user computation failed.
    #[error("computation failed: {0}")]
    Computation(Box<dyn std::error::Error + 'static>),
}

impl Error {
    /// Wrap an arbitrary error raised inside an effect function.
    pub fn computation<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::Computation(Box::new(error))
    }

    /// Build a computation failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Computation(message.into())
    }

    /// Returns true for the two programmer errors the runtime detects itself.
    pub fn is_reentrancy(&self) -> bool {
        matches!(
            self,
            Self::RecursiveCall { .. } | Self::CyclicDependency { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
