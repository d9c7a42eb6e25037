//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a [`Runtime`](crate::Runtime).
///
/// ```rust
/// use lattice_runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "recursion_limit": 10 }"#).unwrap();
/// assert_eq!(config.recursion_limit, 10);
/// assert!(config.record_warnings);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times one job may run within a single flush before the
    /// flush gives up on it.
    pub recursion_limit: usize,

    /// Keep emitted warnings in the runtime's warning log in addition to
    /// logging them through `tracing`.
    pub record_warnings: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 100,
            record_warnings: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields use their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
