//! Deserialization validators
//!
//! A validator is consulted by the [`TypeTranslator`](crate::translator::TypeTranslator)
//! before any host instance is created from a type name, and before each
//! decoded value is assigned into an instance. A rejected creation fails
//! the translation; a rejected assignment only skips that one property.

pub mod class;
pub mod logging;

use std::fmt;

use serde::Deserialize;

use crate::error::Result;
use crate::translator::HostValue;

pub use class::ClassDeserializationValidator;
pub use logging::LoggingValidator;

/// Key of one assignment: a list index or a named property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Index(usize),
    Name(String),
}

impl PropertyKey {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            PropertyKey::Name(name) => Some(name),
            PropertyKey::Index(_) => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(index) => write!(f, "[{}]", index),
            PropertyKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::Index(index)
    }
}

/// Allow/deny configuration loaded from the broker's settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Type name patterns that may be created (full-match regular expressions)
    pub allow_classes: Vec<String>,

    /// Type name patterns that may never be created; deny wins over allow
    pub disallow_classes: Vec<String>,

    /// Add [`DEFAULT_ALLOW_CLASSES`](class::DEFAULT_ALLOW_CLASSES) on initialize
    pub use_default_allow_list: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            allow_classes: Vec::new(),
            disallow_classes: Vec::new(),
            use_default_allow_list: true,
        }
    }
}

impl ValidatorConfig {
    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.allow_classes.push(pattern.into());
        self
    }

    pub fn disallow(mut self, pattern: impl Into<String>) -> Self {
        self.disallow_classes.push(pattern.into());
        self
    }

    pub fn use_default_allow_list(mut self, enabled: bool) -> Self {
        self.use_default_allow_list = enabled;
        self
    }
}

/// Policy consulted during translation
///
/// Implementations are shared across concurrent passes, so any state
/// they keep needs its own synchronization.
pub trait DeserializationValidator: Send + Sync {
    /// Apply configuration once, before the validator is installed
    fn initialize(&mut self, _config: &ValidatorConfig) -> Result<()> {
        Ok(())
    }

    /// Check if an instance of `type_name` may be created
    fn validate_creation(&self, type_name: &str) -> bool;

    /// Check if `value` may be assigned into `instance` at `key`
    fn validate_assignment(&self, instance: &HostValue, key: &PropertyKey, value: &HostValue) -> bool;
}

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl DeserializationValidator for NoopValidator {
    fn validate_creation(&self, _type_name: &str) -> bool {
        true
    }

    fn validate_assignment(&self, _instance: &HostValue, _key: &PropertyKey, _value: &HostValue) -> bool {
        true
    }
}
