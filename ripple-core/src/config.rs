//! Runtime configuration.

use serde::Deserialize;

use crate::error::Result;

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on drain passes when a batch closes.
    pub max_drain_passes: usize,

    /// Window used by `Runtime::throttled_effect_default`, in milliseconds.
    pub default_throttle_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_drain_passes: 10_000,
            default_throttle_ms: 16,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "default_throttle_ms": 50 }"#).unwrap();
        assert_eq!(config.default_throttle_ms, 50);
        assert_eq!(config.max_drain_passes, 10_000);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(RuntimeConfig::from_json("{ nope").is_err());
    }
}
