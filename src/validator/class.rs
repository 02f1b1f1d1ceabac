//! Allow/deny list validator

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use regex::Regex;

use crate::error::{Error, Result};
use crate::translator::{HostValue, AS_OBJECT_TYPE, LIST_TYPE, MAP_TYPE};

use super::{DeserializationValidator, PropertyKey, ValidatorConfig};

/// Patterns applied by [`ClassDeserializationValidator::with_default_allow_list`]
pub const DEFAULT_ALLOW_CLASSES: &[&str] = &[
    AS_OBJECT_TYPE,
    LIST_TYPE,
    MAP_TYPE,
    r"flex\.messaging\..*",
    r"flex\.data\..*",
];

/// Most type names whose decision is remembered
///
/// Names come from the peer, so the cache stops growing here; names past
/// the cap are evaluated against the patterns on every lookup.
pub const MAX_CACHED_DECISIONS: usize = 4096;

#[derive(Default)]
struct Patterns {
    allow: Vec<(String, Regex)>,
    deny: Vec<(String, Regex)>,
}

#[derive(Default)]
struct Decisions {
    allowed: HashSet<String>,
    denied: HashSet<String>,
}

impl Decisions {
    fn len(&self) -> usize {
        self.allowed.len() + self.denied.len()
    }
}

/// Validator that filters creation by type name
///
/// - A name matching any deny pattern is rejected.
/// - Otherwise, if allow patterns exist, the name must match one.
/// - With no patterns at all, every name is accepted.
///
/// Patterns must match the whole name. Decisions are cached per name, up
/// to [`MAX_CACHED_DECISIONS`] names, and the cache is dropped whenever
/// the patterns change. Assignments are always accepted.
#[derive(Default)]
pub struct ClassDeserializationValidator {
    patterns: RwLock<Patterns>,
    decisions: RwLock<Decisions>,
}

impl ClassDeserializationValidator {
    /// Create a validator with no patterns
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator that only allows the built-in host shells and
    /// the `flex.messaging` / `flex.data` namespaces
    pub fn with_default_allow_list() -> Self {
        let validator = Self::new();
        for pattern in DEFAULT_ALLOW_CLASSES {
            // Built-in patterns are known to compile
            let _ = validator.add_allow_pattern(pattern);
        }
        validator
    }

    pub fn add_allow_pattern(&self, pattern: &str) -> Result<()> {
        let regex = compile(pattern)?;
        let mut patterns = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
        patterns.allow.retain(|(p, _)| p != pattern);
        patterns.allow.push((pattern.to_string(), regex));
        drop(patterns);
        self.clear_cache();
        Ok(())
    }

    pub fn remove_allow_pattern(&self, pattern: &str) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .allow
            .retain(|(p, _)| p != pattern);
        self.clear_cache();
    }

    pub fn add_deny_pattern(&self, pattern: &str) -> Result<()> {
        let regex = compile(pattern)?;
        let mut patterns = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
        patterns.deny.retain(|(p, _)| p != pattern);
        patterns.deny.push((pattern.to_string(), regex));
        drop(patterns);
        self.clear_cache();
        Ok(())
    }

    pub fn remove_deny_pattern(&self, pattern: &str) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .deny
            .retain(|(p, _)| p != pattern);
        self.clear_cache();
    }

    fn clear_cache(&self) {
        let mut decisions = self.decisions.write().unwrap_or_else(PoisonError::into_inner);
        decisions.allowed.clear();
        decisions.denied.clear();
    }

    /// Number of type names with a remembered decision
    pub fn cached_decisions(&self) -> usize {
        self.decisions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn cached(&self, type_name: &str) -> Option<bool> {
        let decisions = self.decisions.read().unwrap_or_else(PoisonError::into_inner);
        if decisions.denied.contains(type_name) {
            Some(false)
        } else if decisions.allowed.contains(type_name) {
            Some(true)
        } else {
            None
        }
    }

    fn evaluate(&self, type_name: &str) -> bool {
        let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
        if patterns.deny.iter().any(|(_, re)| re.is_match(type_name)) {
            return false;
        }
        if patterns.allow.is_empty() {
            return true;
        }
        patterns.allow.iter().any(|(_, re)| re.is_match(type_name))
    }
}

impl DeserializationValidator for ClassDeserializationValidator {
    fn initialize(&mut self, config: &ValidatorConfig) -> Result<()> {
        if config.use_default_allow_list {
            for pattern in DEFAULT_ALLOW_CLASSES {
                self.add_allow_pattern(pattern)?;
            }
        }
        for pattern in &config.allow_classes {
            self.add_allow_pattern(pattern)?;
        }
        for pattern in &config.disallow_classes {
            self.add_deny_pattern(pattern)?;
        }
        Ok(())
    }

    fn validate_creation(&self, type_name: &str) -> bool {
        if let Some(decision) = self.cached(type_name) {
            return decision;
        }

        let allowed = self.evaluate(type_name);
        if !allowed {
            tracing::debug!(type_name, "Type creation denied");
        }

        let mut decisions = self.decisions.write().unwrap_or_else(PoisonError::into_inner);
        if decisions.len() < MAX_CACHED_DECISIONS {
            if allowed {
                decisions.allowed.insert(type_name.to_string());
            } else {
                decisions.denied.insert(type_name.to_string());
            }
        }
        allowed
    }

    fn validate_assignment(&self, _instance: &HostValue, _key: &PropertyKey, _value: &HostValue) -> bool {
        true
    }
}

/// Compile a pattern that must match the whole type name
fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| Error::Config(format!("invalid class pattern '{}': {}", pattern, e)))
}
