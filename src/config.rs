//! Virtual machine configuration.

use serde::{Deserialize, Serialize};

/// Default operand stack capacity, in slots.
pub const STACK_MAX: usize = 65536;
/// Default maximum call depth.
pub const FRAMES_MAX: usize = 256;
/// Default number of allocations between collections.
pub const GC_THRESHOLD: usize = 1024;

/// Tunables for a [`Vm`](crate::vm::Vm) instance.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// let config = vesper::config::VmConfig::from_json(r#"{ "gc_threshold": 64 }"#).unwrap();
/// assert_eq!(config.gc_threshold, 64);
/// assert_eq!(config.stack_capacity, vesper::config::STACK_MAX);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Operand stack capacity. Pushing past it is fatal.
    pub stack_capacity: usize,
    /// Maximum number of active call frames.
    pub max_frames: usize,
    /// Allocations between automatic collections. Zero disables automatic GC.
    pub gc_threshold: usize,
    /// Upper bound on live heap objects, if any.
    pub max_heap_objects: Option<usize>,
}

impl VmConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: STACK_MAX,
            max_frames: FRAMES_MAX,
            gc_threshold: GC_THRESHOLD,
            max_heap_objects: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = VmConfig::from_json(r#"{ "max_frames": 8 }"#).unwrap();
        assert_eq!(config.max_frames, 8);
        assert_eq!(config.stack_capacity, STACK_MAX);
        assert_eq!(config.gc_threshold, GC_THRESHOLD);
        assert_eq!(config.max_heap_objects, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = VmConfig {
            max_heap_objects: Some(100),
            ..VmConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(VmConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(VmConfig::from_json("{ stack_capacity: }").is_err());
    }
}
