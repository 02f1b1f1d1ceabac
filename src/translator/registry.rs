//! Alias to host class registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::host::RemoteClass;

type Factory = Arc<dyn Fn() -> Box<dyn RemoteClass> + Send + Sync>;

/// Maps wire aliases to factories producing default instances
///
/// The registry is built once and shared; translation never creates a
/// type that was not registered here (unless configured to fall back to
/// [`AsObject`](super::AsObject)).
#[derive(Clone, Default)]
pub struct ClassRegistry {
    factories: HashMap<String, Factory>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type created through its `Default` impl
    pub fn register<C: RemoteClass + Default>(&mut self, alias: impl Into<String>) -> &mut Self {
        self.register_with(alias, || Box::new(C::default()))
    }

    /// Register a custom factory
    pub fn register_with<F>(&mut self, alias: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn RemoteClass> + Send + Sync + 'static,
    {
        self.factories.insert(alias.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.factories.contains_key(alias)
    }

    /// Create a default instance for an alias
    pub fn create(&self, alias: &str) -> Option<Box<dyn RemoteClass>> {
        self.factories.get(alias).map(|factory| factory())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        f.debug_struct("ClassRegistry")
            .field("aliases", &aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::AsObject;

    #[test]
    fn test_register_and_create() {
        let mut registry = ClassRegistry::new();
        registry
            .register::<AsObject>("plain")
            .register_with("com.example.Tagged", || Box::new(AsObject::typed("com.example.Tagged")));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("plain"));
        assert!(registry.create("missing").is_none());

        let instance = registry.create("com.example.Tagged").unwrap();
        assert_eq!(instance.type_name(), "com.example.Tagged");
    }
}
