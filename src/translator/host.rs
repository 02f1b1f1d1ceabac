//! Host-side values
//!
//! Composite host values are shared handles (`Rc<RefCell<..>>`): two
//! references to one wire node translate to two clones of one handle, so
//! cycles and shared subgraphs keep their identity. A cyclic graph keeps
//! itself alive until one of its links is cleared.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use time::OffsetDateTime;

use crate::error::TranslationError;

use super::target::TargetType;

/// Creation name checked before an anonymous object shell is built
pub const AS_OBJECT_TYPE: &str = "AsObject";

/// Creation name checked before a list shell is built
pub const LIST_TYPE: &str = "List";

/// Creation name checked before a map shell is built
pub const MAP_TYPE: &str = "Map";

/// A materialized host value
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Date(OffsetDateTime),
    Xml(String),
    Bytes(Vec<u8>),
    Enum { type_name: String, constant: String },
    List(HostList),
    Map(HostMap),
    Object(HostObject),
}

impl HostValue {
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i as i64),
            HostValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Long(l) => Some(*l as f64),
            HostValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&HostList> {
        match self {
            HostValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HostMap> {
        match self {
            HostValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Get the type name for debugging
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Long(_) => "long",
            HostValue::Double(_) => "double",
            HostValue::String(_) => "string",
            HostValue::Date(_) => "date",
            HostValue::Xml(_) => "xml",
            HostValue::Bytes(_) => "bytes",
            HostValue::Enum { .. } => "enum",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "map",
            HostValue::Object(_) => "object",
        }
    }
}

/// Scalars compare by value, composites by identity
impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Long(a), HostValue::Long(b)) => a == b,
            (HostValue::Double(a), HostValue::Double(b)) => a.to_bits() == b.to_bits(),
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Date(a), HostValue::Date(b)) => a == b,
            (HostValue::Xml(a), HostValue::Xml(b)) => a == b,
            (HostValue::Bytes(a), HostValue::Bytes(b)) => a == b,
            (
                HostValue::Enum { type_name: t1, constant: c1 },
                HostValue::Enum { type_name: t2, constant: c2 },
            ) => t1 == t2 && c1 == c2,
            (HostValue::List(a), HostValue::List(b)) => a.ptr_eq(b),
            (HostValue::Map(a), HostValue::Map(b)) => a.ptr_eq(b),
            (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("Null"),
            HostValue::Bool(b) => write!(f, "Bool({})", b),
            HostValue::Int(i) => write!(f, "Int({})", i),
            HostValue::Long(l) => write!(f, "Long({})", l),
            HostValue::Double(d) => write!(f, "Double({})", d),
            HostValue::String(s) => write!(f, "String({:?})", s),
            HostValue::Date(d) => write!(f, "Date({})", d),
            HostValue::Xml(s) => write!(f, "Xml({:?})", s),
            HostValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            HostValue::Enum { type_name, constant } => write!(f, "Enum({}.{})", type_name, constant),
            HostValue::List(list) => list.fmt(f),
            HostValue::Map(map) => map.fmt(f),
            HostValue::Object(object) => object.fmt(f),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Int(i)
    }
}

impl From<i64> for HostValue {
    fn from(l: i64) -> Self {
        HostValue::Long(l)
    }
}

impl From<f64> for HostValue {
    fn from(d: f64) -> Self {
        HostValue::Double(d)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<HostList> for HostValue {
    fn from(list: HostList) -> Self {
        HostValue::List(list)
    }
}

impl From<HostMap> for HostValue {
    fn from(map: HostMap) -> Self {
        HostValue::Map(map)
    }
}

impl From<HostObject> for HostValue {
    fn from(object: HostObject) -> Self {
        HostValue::Object(object)
    }
}

/// Shared, growable list
#[derive(Clone, Default)]
pub struct HostList(Rc<RefCell<Vec<HostValue>>>);

impl HostList {
    pub fn new(items: Vec<HostValue>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn borrow(&self) -> Ref<'_, Vec<HostValue>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<HostValue>> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: HostValue) {
        self.0.borrow_mut().push(value);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for HostList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => write!(f, "List(len={})", items.len()),
            Err(_) => f.write_str("List(<borrowed>)"),
        }
    }
}

/// Hashable form of a map key, agreeing with `HostValue` equality
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyForm {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(u64),
    String(String),
    Date(i128),
    Xml(String),
    Bytes(Vec<u8>),
    Enum(String, String),
    List(usize),
    Map(usize),
    Object(usize),
}

impl KeyForm {
    fn of(value: &HostValue) -> Self {
        match value {
            HostValue::Null => KeyForm::Null,
            HostValue::Bool(b) => KeyForm::Bool(*b),
            HostValue::Int(i) => KeyForm::Int(*i),
            HostValue::Long(l) => KeyForm::Long(*l),
            HostValue::Double(d) => KeyForm::Double(d.to_bits()),
            HostValue::String(s) => KeyForm::String(s.clone()),
            HostValue::Date(d) => KeyForm::Date(d.unix_timestamp_nanos()),
            HostValue::Xml(s) => KeyForm::Xml(s.clone()),
            HostValue::Bytes(b) => KeyForm::Bytes(b.clone()),
            HostValue::Enum { type_name, constant } => KeyForm::Enum(type_name.clone(), constant.clone()),
            HostValue::List(list) => KeyForm::List(list.addr()),
            HostValue::Map(map) => KeyForm::Map(map.addr()),
            HostValue::Object(object) => KeyForm::Object(object.addr()),
        }
    }
}

#[derive(Default)]
struct MapEntries {
    entries: Vec<(HostValue, HostValue)>,
    index: HashMap<KeyForm, usize>,
}

impl MapEntries {
    fn insert(&mut self, key: HostValue, value: HostValue) {
        let position = self.entries.len();
        match self.index.entry(KeyForm::of(&key)) {
            Entry::Occupied(slot) => self.entries[*slot.get()].1 = value,
            Entry::Vacant(slot) => {
                slot.insert(position);
                self.entries.push((key, value));
            }
        }
    }

    fn get(&self, key: &KeyForm) -> Option<HostValue> {
        self.index
            .get(key)
            .and_then(|position| self.entries.get(*position))
            .map(|(_, v)| v.clone())
    }
}

/// Shared map preserving insertion order; keys may be any host value
///
/// Lookups go through a hashed index so building a map from `n` entries
/// stays linear.
#[derive(Clone, Default)]
pub struct HostMap(Rc<RefCell<MapEntries>>);

impl HostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map; a repeated key keeps its first position and last value
    pub fn from_entries(entries: Vec<(HostValue, HostValue)>) -> Self {
        let mut map = MapEntries {
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
        };
        for (key, value) in entries {
            map.insert(key, value);
        }
        Self(Rc::new(RefCell::new(map)))
    }

    /// Entries in insertion order
    pub fn borrow(&self) -> Ref<'_, Vec<(HostValue, HostValue)>> {
        Ref::map(self.0.borrow(), |map| &map.entries)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().entries.is_empty()
    }

    /// Insert or replace the value for `key`
    pub fn insert(&self, key: HostValue, value: HostValue) {
        self.0.borrow_mut().insert(key, value);
    }

    pub fn get(&self, key: &HostValue) -> Option<HostValue> {
        self.0.borrow().get(&KeyForm::of(key))
    }

    /// Look up a string key
    pub fn get_str(&self, key: &str) -> Option<HostValue> {
        self.0.borrow().get(&KeyForm::String(key.to_string()))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for HostMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(map) => write!(f, "Map(len={})", map.entries.len()),
            Err(_) => f.write_str("Map(<borrowed>)"),
        }
    }
}

/// Shared handle to a class instance
///
/// The completion step may swap the boxed instance for another one; every
/// clone of the handle observes the replacement.
#[derive(Clone)]
pub struct HostObject(Rc<RefCell<Box<dyn RemoteClass>>>);

impl HostObject {
    pub fn new<C: RemoteClass>(instance: C) -> Self {
        Self::from_box(Box::new(instance))
    }

    pub fn from_box(instance: Box<dyn RemoteClass>) -> Self {
        Self(Rc::new(RefCell::new(instance)))
    }

    pub fn borrow(&self) -> Ref<'_, Box<dyn RemoteClass>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Box<dyn RemoteClass>> {
        self.0.borrow_mut()
    }

    pub fn type_name(&self) -> String {
        self.0.borrow().type_name().to_string()
    }

    /// Read one property (sealed or dynamic)
    pub fn get(&self, name: &str) -> Option<HostValue> {
        self.0.borrow().get_property(name)
    }

    /// Run `f` against the concrete instance if it has type `T`
    pub fn with<T: RemoteClass, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let instance = self.0.borrow();
        instance.as_any().downcast_ref::<T>().map(f)
    }

    pub(crate) fn replace(&self, instance: Box<dyn RemoteClass>) {
        *self.0.borrow_mut() = instance;
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(instance) => write!(f, "Object({})", instance.type_name()),
            Err(_) => f.write_str("Object(<borrowed>)"),
        }
    }
}

/// A host type that can be created from, and written as, an AMF object
///
/// Implementations are registered by alias in a
/// [`ClassRegistry`](super::ClassRegistry). Translation creates the
/// default instance, assigns each member through
/// [`set_property`](RemoteClass::set_property), then calls
/// [`complete`](RemoteClass::complete).
pub trait RemoteClass: Any {
    /// Alias written on the wire
    fn type_name(&self) -> &str;

    /// Sealed property names, in wire order
    fn property_names(&self) -> Vec<String>;

    /// Expected type of a property, used as the translation target
    fn property_type(&self, _name: &str) -> TargetType {
        TargetType::Any
    }

    fn get_property(&self, name: &str) -> Option<HostValue>;

    fn set_property(&mut self, name: &str, value: HostValue) -> Result<(), TranslationError>;

    /// Check if instances accept properties beyond the sealed ones
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Dynamic properties, in insertion order
    fn dynamic_properties(&self) -> Vec<(String, HostValue)> {
        Vec::new()
    }

    /// Check if the body is written by [`RemoteClass::write_external`]
    fn is_externalizable(&self) -> bool {
        false
    }

    /// Populate from the values an externalizer read
    fn read_external(&mut self, _values: Vec<HostValue>) -> Result<(), TranslationError> {
        Err(TranslationError::UnsupportedConversion {
            from: "externalizable body",
            to: self.type_name().to_string(),
        })
    }

    /// Values handed to the externalizer on encode
    fn write_external(&self) -> Vec<HostValue> {
        Vec::new()
    }

    /// Finish construction once every property is assigned
    ///
    /// Returning a new instance replaces this one behind every handle.
    fn complete(&mut self) -> Result<Option<Box<dyn RemoteClass>>, TranslationError> {
        Ok(None)
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Generic object for anonymous or unregistered types
///
/// Properties keep insertion order; a name index makes repeated
/// assignment constant time.
#[derive(Debug, Clone, Default)]
pub struct AsObject {
    type_name: String,
    properties: Vec<(String, HostValue)>,
    index: HashMap<String, usize>,
}

impl AsObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object that keeps an unregistered alias
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: String, value: HostValue) {
        match self.index.get(&name) {
            Some(position) => self.properties[*position].1 = value,
            None => {
                self.index.insert(name.clone(), self.properties.len());
                self.properties.push((name, value));
            }
        }
    }

    /// Properties in insertion order
    pub fn properties(&self) -> &[(String, HostValue)] {
        &self.properties
    }
}

impl RemoteClass for AsObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn property_names(&self) -> Vec<String> {
        if self.type_name.is_empty() {
            Vec::new()
        } else {
            self.properties.iter().map(|(n, _)| n.clone()).collect()
        }
    }

    fn get_property(&self, name: &str) -> Option<HostValue> {
        self.index
            .get(name)
            .and_then(|position| self.properties.get(*position))
            .map(|(_, v)| v.clone())
    }

    fn set_property(&mut self, name: &str, value: HostValue) -> Result<(), TranslationError> {
        self.insert(name.to_string(), value);
        Ok(())
    }

    fn is_dynamic(&self) -> bool {
        self.type_name.is_empty()
    }

    fn dynamic_properties(&self) -> Vec<(String, HostValue)> {
        if self.type_name.is_empty() {
            self.properties.clone()
        } else {
            Vec::new()
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composites_compare_by_identity() {
        let a = HostList::new(vec![HostValue::Int(1)]);
        let b = HostList::new(vec![HostValue::Int(1)]);
        assert_eq!(HostValue::List(a.clone()), HostValue::List(a.clone()));
        assert_ne!(HostValue::List(a), HostValue::List(b));
        assert_eq!(HostValue::Double(f64::NAN), HostValue::Double(f64::NAN));
    }

    #[test]
    fn test_map_insert_replaces() {
        let map = HostMap::new();
        map.insert("a".into(), HostValue::Int(1));
        map.insert("a".into(), HostValue::Int(2));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_str("a"), Some(HostValue::Int(2)));
    }

    #[test]
    fn test_map_keys_follow_value_equality() {
        let list = HostList::new(Vec::new());
        let map = HostMap::from_entries(vec![
            (HostValue::Int(1), "int".into()),
            (HostValue::Long(1), "long".into()),
            (HostValue::Double(f64::NAN), "nan".into()),
            (HostValue::List(list.clone()), "list".into()),
            (HostValue::Int(1), "again".into()),
        ]);

        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&HostValue::Int(1)), Some("again".into()));
        assert_eq!(map.get(&HostValue::Long(1)), Some("long".into()));
        assert_eq!(map.get(&HostValue::Double(f64::NAN)), Some("nan".into()));
        assert_eq!(map.get(&HostValue::List(list)), Some("list".into()));
        assert_eq!(map.get(&HostValue::List(HostList::new(Vec::new()))), None);
        assert_eq!(map.borrow()[0].1, HostValue::String("again".into()));
    }

    #[test]
    fn test_large_maps_build_quickly() {
        let map = HostMap::new();
        let mut object = AsObject::new();
        for i in 0..200_000 {
            map.insert(HostValue::String(i.to_string()), HostValue::Int(i));
            object.insert(i.to_string(), HostValue::Int(i));
        }
        assert_eq!(map.len(), 200_000);
        assert_eq!(map.get_str("199999"), Some(HostValue::Int(199_999)));
        assert_eq!(object.get_property("123456"), Some(HostValue::Int(123_456)));

        object.insert("7".into(), HostValue::Null);
        assert_eq!(object.properties().len(), 200_000);
        assert_eq!(object.properties()[7].1, HostValue::Null);
    }

    #[test]
    fn test_debug_does_not_recurse() {
        let list = HostList::new(Vec::new());
        list.push(HostValue::List(list.clone()));
        assert_eq!(format!("{:?}", HostValue::List(list.clone())), "List(len=1)");
        list.borrow_mut().clear();
    }

    #[test]
    fn test_as_object_downcast() {
        let object = HostObject::new(AsObject::typed("com.example.Thing").with("id", 3i32));
        assert_eq!(object.type_name(), "com.example.Thing");
        assert_eq!(object.get("id"), Some(HostValue::Int(3)));
        assert_eq!(
            object.with(|o: &AsObject| o.properties().len()),
            Some(1)
        );
    }

    #[test]
    fn test_replace_is_seen_by_clones() {
        let object = HostObject::new(AsObject::typed("a"));
        let alias = object.clone();
        object.replace(Box::new(AsObject::typed("b")));
        assert_eq!(alias.type_name(), "b");
    }
}
