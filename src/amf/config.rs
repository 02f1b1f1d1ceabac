//! Codec configuration

use std::sync::Arc;

use serde::Deserialize;

use super::external::ExternalizerRegistry;

/// Default cap on value nesting
///
/// Decoding recurses once per level; 128 levels stay well inside a 2 MB
/// thread stack in unoptimized builds.
pub const DEFAULT_MAX_OBJECT_DEPTH: usize = 128;

/// Default cap on entries in any one reference table
pub const DEFAULT_MAX_REFERENCES: usize = 1 << 20;

/// Largest pre-allocation made from a length read off the wire
pub const DEFAULT_INITIAL_COLLECTION_CAPACITY: usize = 1024;

/// Limits applied to every encode/decode pass
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SerializationConfig {
    /// Maximum nesting of composite values
    pub max_object_depth: usize,

    /// Maximum entries per reference table (strings, objects, traits)
    pub max_references: usize,

    /// Upper bound for `Vec::with_capacity` driven by untrusted lengths
    pub initial_collection_capacity: usize,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            max_object_depth: DEFAULT_MAX_OBJECT_DEPTH,
            max_references: DEFAULT_MAX_REFERENCES,
            initial_collection_capacity: DEFAULT_INITIAL_COLLECTION_CAPACITY,
        }
    }
}

impl SerializationConfig {
    /// Tight limits for endpoints exposed to untrusted peers
    pub fn strict() -> Self {
        Self {
            max_object_depth: 64,
            max_references: 64 * 1024,
            initial_collection_capacity: 256,
        }
    }

    /// Set maximum nesting depth
    pub fn max_object_depth(mut self, depth: usize) -> Self {
        self.max_object_depth = depth.max(1);
        self
    }

    /// Set maximum reference table size
    pub fn max_references(mut self, max: usize) -> Self {
        self.max_references = max;
        self
    }

    /// Set the pre-allocation cap
    pub fn initial_collection_capacity(mut self, capacity: usize) -> Self {
        self.initial_collection_capacity = capacity;
        self
    }

    pub(crate) fn capacity_for(&self, declared: usize) -> usize {
        declared.min(self.initial_collection_capacity)
    }
}

/// Limits plus the externalizer hooks shared by every pass
#[derive(Debug, Clone, Default)]
pub struct CodecContext {
    pub config: SerializationConfig,
    pub externalizers: Arc<ExternalizerRegistry>,
}

impl CodecContext {
    pub fn new(config: SerializationConfig) -> Self {
        Self {
            config,
            externalizers: Arc::new(ExternalizerRegistry::default()),
        }
    }

    /// Replace the externalizer registry
    pub fn externalizers(mut self, externalizers: Arc<ExternalizerRegistry>) -> Self {
        self.externalizers = externalizers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SerializationConfig::default();
        assert_eq!(config.max_object_depth, 128);
        assert_eq!(config.capacity_for(1 << 28), 1024);
        assert_eq!(config.capacity_for(3), 3);
    }

    #[test]
    fn test_builder() {
        let config = SerializationConfig::default()
            .max_object_depth(0)
            .max_references(10);
        assert_eq!(config.max_object_depth, 1);
        assert_eq!(config.max_references, 10);
        assert_eq!(SerializationConfig::strict().max_object_depth, 64);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SerializationConfig =
            serde_json::from_str(r#"{ "max_object_depth": 32 }"#).unwrap();
        assert_eq!(config.max_object_depth, 32);
        assert_eq!(config.max_references, DEFAULT_MAX_REFERENCES);
    }
}
