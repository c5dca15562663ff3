//! Runtime limits and collector tuning.

use serde::{Deserialize, Serialize};

/// The `[runtime]` section of `ember.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bytes allocated between collections.
    pub gc_interval: usize,
    /// Maximum frames on one fiber's stack.
    pub max_call_depth: usize,
    /// Maximum nesting of fibers resuming fibers.
    pub max_fiber_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gc_interval: 0x10000,
            max_call_depth: 1024,
            max_fiber_depth: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"max_call_depth": 16}"#).unwrap();
        assert_eq!(config.max_call_depth, 16);
        assert_eq!(config.gc_interval, 0x10000);
        assert_eq!(config.max_fiber_depth, 64);
    }
}
