//! Translator configuration

use serde::Deserialize;

/// Default cap on translation nesting, matching the codec's default
pub const DEFAULT_MAX_DEPTH: usize = crate::amf::config::DEFAULT_MAX_OBJECT_DEPTH;

/// What a collection does when one of its elements has an unknown type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Fail the whole translation
    #[default]
    Propagate,
    /// Put null in place of the element
    SubstituteNull,
}

/// Translator settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Maximum nesting of composite values
    pub max_depth: usize,

    /// Allow XML documents to be materialized
    pub allow_xml: bool,

    /// Build an `AsObject` for aliases missing from the class registry
    pub create_as_object_for_missing_type: bool,

    /// Skip properties whose assignment fails instead of failing the object
    pub ignore_property_errors: bool,

    pub unknown_type_policy: UnknownTypePolicy,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            allow_xml: false,
            create_as_object_for_missing_type: false,
            ignore_property_errors: true,
            unknown_type_policy: UnknownTypePolicy::Propagate,
        }
    }
}

impl TranslatorConfig {
    /// Set maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Allow or forbid XML content
    pub fn allow_xml(mut self, allow: bool) -> Self {
        self.allow_xml = allow;
        self
    }

    /// Fall back to `AsObject` for unregistered aliases
    pub fn create_as_object_for_missing_type(mut self, enabled: bool) -> Self {
        self.create_as_object_for_missing_type = enabled;
        self
    }

    /// Skip failing property assignments
    pub fn ignore_property_errors(mut self, ignore: bool) -> Self {
        self.ignore_property_errors = ignore;
        self
    }

    /// Set the unknown element policy
    pub fn unknown_type_policy(mut self, policy: UnknownTypePolicy) -> Self {
        self.unknown_type_policy = policy;
        self
    }
}
