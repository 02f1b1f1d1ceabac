//! Validator that reports the types a peer asks for

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::translator::HostValue;

use super::{DeserializationValidator, NoopValidator, PropertyKey, ValidatorConfig};

/// Logs every distinct type name once, then defers to `inner`
///
/// Useful for building an allow list: run with the no-op inner validator,
/// collect [`LoggingValidator::seen`], then switch to a
/// [`ClassDeserializationValidator`](super::ClassDeserializationValidator).
pub struct LoggingValidator<V = NoopValidator> {
    inner: V,
    seen: Mutex<BTreeSet<String>>,
}

impl<V: DeserializationValidator> LoggingValidator<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            seen: Mutex::new(BTreeSet::new()),
        }
    }

    /// Type names observed so far, sorted
    pub fn seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }
}

impl Default for LoggingValidator<NoopValidator> {
    fn default() -> Self {
        Self::new(NoopValidator)
    }
}

impl<V: DeserializationValidator> DeserializationValidator for LoggingValidator<V> {
    fn initialize(&mut self, config: &ValidatorConfig) -> Result<()> {
        self.inner.initialize(config)
    }

    fn validate_creation(&self, type_name: &str) -> bool {
        let first = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name.to_string());
        if first {
            tracing::info!(type_name, "Deserializing type");
        }
        self.inner.validate_creation(type_name)
    }

    fn validate_assignment(&self, instance: &HostValue, key: &PropertyKey, value: &HostValue) -> bool {
        self.inner.validate_assignment(instance, key, value)
    }
}
