//! Traits descriptors and the per-graph traits registry
//!
//! Traits describe the serializable shape of a type: its alias, the
//! ordered sealed member names and the dynamic/externalizable flags.
//! They are shared by every instance of the same shape so the codec
//! can send them once per body.

use std::collections::HashSet;

use crate::error::AmfError;

use super::reference::{EqualityTable, ReferenceTable};

/// Serializable shape of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Traits {
    type_name: String,
    members: Vec<String>,
    dynamic: bool,
    externalizable: bool,
}

impl Traits {
    /// Build a descriptor, rejecting duplicate member names
    ///
    /// Externalizable traits never carry members; any given are dropped.
    pub fn new(
        type_name: impl Into<String>,
        members: Vec<String>,
        dynamic: bool,
        externalizable: bool,
    ) -> Result<Self, AmfError> {
        let type_name = type_name.into();
        let members = if externalizable { Vec::new() } else { members };

        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(member.as_str()) {
                return Err(AmfError::DuplicateMember {
                    type_name,
                    member: member.clone(),
                });
            }
        }

        Ok(Self {
            type_name,
            members,
            dynamic,
            externalizable,
        })
    }

    /// Anonymous dynamic shape used by plain untyped objects
    pub fn anonymous_dynamic() -> Self {
        Self {
            type_name: String::new(),
            members: Vec::new(),
            dynamic: true,
            externalizable: false,
        }
    }

    /// Shape of an externalizable type
    pub fn externalizable(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
            dynamic: false,
            externalizable: true,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_externalizable(&self) -> bool {
        self.externalizable
    }

    /// Check if the type has no alias
    pub fn is_anonymous(&self) -> bool {
        self.type_name.is_empty()
    }

    /// Position of a sealed member
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m == name)
    }
}

/// Handle into a [`TraitsRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraitsHandle(pub(crate) u32);

impl TraitsHandle {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Equality-backed cache of traits
///
/// Equal descriptors always resolve to the same handle, so every object
/// of one shape in a graph points at a single entry.
#[derive(Debug, Clone, Default)]
pub struct TraitsRegistry {
    table: EqualityTable<Traits>,
    traits: Vec<Traits>,
}

impl TraitsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve or register the descriptor built from the given parts
    pub fn get_or_create(
        &mut self,
        type_name: impl Into<String>,
        members: Vec<String>,
        dynamic: bool,
        externalizable: bool,
    ) -> Result<TraitsHandle, AmfError> {
        let traits = Traits::new(type_name, members, dynamic, externalizable)?;
        Ok(self.insert(traits))
    }

    /// Resolve or register an already built descriptor
    pub fn insert(&mut self, traits: Traits) -> TraitsHandle {
        let interned = self.table.intern(&traits);
        if interned.is_new() {
            self.traits.push(traits);
        }
        TraitsHandle(interned.handle())
    }

    pub fn get(&self, handle: TraitsHandle) -> Option<&Traits> {
        self.traits.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_equal_traits_share_handle() {
        let mut registry = TraitsRegistry::new();
        let a = registry
            .get_or_create("com.example.User", names(&["id", "name"]), false, false)
            .unwrap();
        let b = registry
            .get_or_create("com.example.User", names(&["id", "name"]), false, false)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_flags_and_order_distinguish_traits() {
        let mut registry = TraitsRegistry::new();
        let sealed = registry
            .get_or_create("T", names(&["a", "b"]), false, false)
            .unwrap();
        let dynamic = registry
            .get_or_create("T", names(&["a", "b"]), true, false)
            .unwrap();
        let reordered = registry
            .get_or_create("T", names(&["b", "a"]), false, false)
            .unwrap();
        assert_ne!(sealed, dynamic);
        assert_ne!(sealed, reordered);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_empty_traits_are_cached() {
        let mut registry = TraitsRegistry::new();
        let a = registry.get_or_create("", Vec::new(), false, false).unwrap();
        let b = registry.get_or_create("", Vec::new(), false, false).unwrap();
        assert_eq!(a, b);
        assert!(registry.get(a).unwrap().members().is_empty());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let err = Traits::new("T", names(&["id", "id"]), false, false).unwrap_err();
        assert!(matches!(err, AmfError::DuplicateMember { ref member, .. } if member == "id"));
    }

    #[test]
    fn test_externalizable_drops_members() {
        let traits = Traits::new("flex.messaging.io.ArrayCollection", names(&["x"]), false, true)
            .unwrap();
        assert!(traits.members().is_empty());
        assert_eq!(traits, Traits::externalizable("flex.messaging.io.ArrayCollection"));
    }
}
