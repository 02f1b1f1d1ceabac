//! Wire value model
//!
//! Both AMF0 and AMF3 decode into the same representation. Scalars are
//! held inline in [`WireValue`]; composites (objects, arrays,
//! dictionaries, vectors) live in an [`ObjectGraph`] arena and are
//! referred to by [`NodeId`]. The arena is what lets a graph contain
//! cycles: a child may point back at any ancestor's id.
//!
//! Dates, XML and byte arrays read from AMF3 also become nodes
//! ([`Node::Shared`]) so a later reference to one stays a reference when
//! the graph is written again.

use std::collections::HashSet;

use crate::error::AmfError;

use super::traits::{Traits, TraitsHandle, TraitsRegistry};

/// Identity of a composite inside an [`ObjectGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Dynamic intermediate value
///
/// `PartialEq` here is shallow: two `Node` values are equal only when
/// they name the same node. Use [`Payload`] equality for a structural
/// comparison across graphs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WireValue {
    /// Undefined (AMF0: 0x06, AMF3: 0x00)
    Undefined,

    /// Null (AMF0: 0x05, AMF3: 0x01)
    #[default]
    Null,

    /// Boolean (AMF0: 0x01, AMF3: 0x02/0x03)
    Bool(bool),

    /// Integer; only the 29-bit range travels as an AMF3 integer
    Integer(i32),

    /// IEEE 754 double (AMF0: 0x00, AMF3: 0x05)
    Double(f64),

    /// UTF-8 string
    String(String),

    /// Milliseconds since the Unix epoch
    Date(f64),

    /// Legacy XML document (AMF0: 0x0F, AMF3: 0x07)
    XmlDocument(String),

    /// E4X XML (AMF3: 0x0B)
    Xml(String),

    /// Raw bytes (AMF3: 0x0C)
    ByteArray(Vec<u8>),

    /// Composite stored in the graph
    Node(NodeId),
}

impl WireValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of integers and doubles
    pub fn as_number(&self) -> Option<f64> {
        match self {
            WireValue::Integer(i) => Some(*i as f64),
            WireValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            WireValue::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, WireValue::Null | WireValue::Undefined)
    }

    /// Short name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            WireValue::Undefined => "undefined",
            WireValue::Null => "null",
            WireValue::Bool(_) => "boolean",
            WireValue::Integer(_) => "integer",
            WireValue::Double(_) => "double",
            WireValue::String(_) => "string",
            WireValue::Date(_) => "date",
            WireValue::XmlDocument(_) => "xmldocument",
            WireValue::Xml(_) => "xml",
            WireValue::ByteArray(_) => "bytearray",
            WireValue::Node(_) => "node",
        }
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Bool(v)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        WireValue::Integer(v)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::Double(v)
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::String(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(v.to_string())
    }
}

impl From<NodeId> for WireValue {
    fn from(v: NodeId) -> Self {
        WireValue::Node(v)
    }
}

/// Object instance: sealed members aligned with its traits, then a dynamic tail
#[derive(Debug, Clone, PartialEq)]
pub struct WireObject {
    pub traits: TraitsHandle,
    /// One value per traits member, in traits order. For externalizable
    /// objects this holds whatever the externalizer produced.
    pub members: Vec<WireValue>,
    pub dynamic_members: Vec<(String, WireValue)>,
}

impl WireObject {
    pub fn new(traits: TraitsHandle) -> Self {
        Self {
            traits,
            members: Vec::new(),
            dynamic_members: Vec::new(),
        }
    }
}

/// Array with an associative part and a dense part
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireArray {
    pub associative: Vec<(String, WireValue)>,
    pub dense: Vec<WireValue>,
}

impl WireArray {
    pub fn dense(values: Vec<WireValue>) -> Self {
        Self {
            associative: Vec::new(),
            dense: values,
        }
    }

    pub fn is_ecma(&self) -> bool {
        !self.associative.is_empty()
    }
}

/// AS3 Dictionary: arbitrary keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireDictionary {
    pub weak_keys: bool,
    pub entries: Vec<(WireValue, WireValue)>,
}

/// Typed vector payload
#[derive(Debug, Clone, PartialEq)]
pub enum VectorItems {
    Int(Vec<i32>),
    Uint(Vec<u32>),
    Double(Vec<f64>),
    Object {
        type_name: String,
        items: Vec<WireValue>,
    },
}

impl VectorItems {
    pub fn len(&self) -> usize {
        match self {
            VectorItems::Int(v) => v.len(),
            VectorItems::Uint(v) => v.len(),
            VectorItems::Double(v) => v.len(),
            VectorItems::Object { items, .. } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type label (`int`, `uint`, `double`, `object`)
    pub fn kind_name(&self) -> &'static str {
        match self {
            VectorItems::Int(_) => "int",
            VectorItems::Uint(_) => "uint",
            VectorItems::Double(_) => "double",
            VectorItems::Object { .. } => "object",
        }
    }
}

/// Date, XML or byte array held as a node so references to it keep its identity
#[derive(Debug, Clone, PartialEq)]
pub enum SharedValue {
    Date(f64),
    XmlDocument(String),
    Xml(String),
    ByteArray(Vec<u8>),
}

impl SharedValue {
    /// Take the identity-less counterpart of a scalar, if it has one
    pub fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Date(millis) => Some(SharedValue::Date(*millis)),
            WireValue::XmlDocument(s) => Some(SharedValue::XmlDocument(s.clone())),
            WireValue::Xml(s) => Some(SharedValue::Xml(s.clone())),
            WireValue::ByteArray(bytes) => Some(SharedValue::ByteArray(bytes.clone())),
            _ => None,
        }
    }

    /// Inline scalar with the same content
    pub fn to_wire(&self) -> WireValue {
        match self {
            SharedValue::Date(millis) => WireValue::Date(*millis),
            SharedValue::XmlDocument(s) => WireValue::XmlDocument(s.clone()),
            SharedValue::Xml(s) => WireValue::Xml(s.clone()),
            SharedValue::ByteArray(bytes) => WireValue::ByteArray(bytes.clone()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SharedValue::Date(_) => "date",
            SharedValue::XmlDocument(_) => "xmldocument",
            SharedValue::Xml(_) => "xml",
            SharedValue::ByteArray(_) => "bytearray",
        }
    }
}

/// AS3 typed vector
#[derive(Debug, Clone, PartialEq)]
pub struct WireVector {
    pub fixed: bool,
    pub items: VectorItems,
}

/// Composite stored in the arena
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Object(WireObject),
    Array(WireArray),
    Dictionary(WireDictionary),
    Vector(WireVector),
    Shared(SharedValue),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Object(_) => "object",
            Node::Array(_) => "array",
            Node::Dictionary(_) => "dictionary",
            Node::Vector(_) => "vector",
            Node::Shared(shared) => shared.kind_name(),
        }
    }
}

/// Arena owning every composite of one header or body, plus its traits
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
    traits: TraitsRegistry,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traits(&self) -> &TraitsRegistry {
        &self.traits
    }

    pub fn traits_mut(&mut self) -> &mut TraitsRegistry {
        &mut self.traits
    }

    /// Add a node, returning its id
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId((self.nodes.len() - 1) as u32)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Fetch a node or fail with [`AmfError::DanglingNode`]
    pub fn expect_node(&self, id: NodeId) -> Result<&Node, AmfError> {
        self.node(id).ok_or(AmfError::DanglingNode(id.0))
    }

    pub fn object(&self, id: NodeId) -> Option<&WireObject> {
        match self.node(id) {
            Some(Node::Object(o)) => Some(o),
            _ => None,
        }
    }

    pub fn object_mut(&mut self, id: NodeId) -> Option<&mut WireObject> {
        match self.node_mut(id) {
            Some(Node::Object(o)) => Some(o),
            _ => None,
        }
    }

    pub fn array(&self, id: NodeId) -> Option<&WireArray> {
        match self.node(id) {
            Some(Node::Array(a)) => Some(a),
            _ => None,
        }
    }

    pub fn array_mut(&mut self, id: NodeId) -> Option<&mut WireArray> {
        match self.node_mut(id) {
            Some(Node::Array(a)) => Some(a),
            _ => None,
        }
    }

    pub fn dictionary(&self, id: NodeId) -> Option<&WireDictionary> {
        match self.node(id) {
            Some(Node::Dictionary(d)) => Some(d),
            _ => None,
        }
    }

    pub fn vector(&self, id: NodeId) -> Option<&WireVector> {
        match self.node(id) {
            Some(Node::Vector(v)) => Some(v),
            _ => None,
        }
    }

    pub fn shared(&self, id: NodeId) -> Option<&SharedValue> {
        match self.node(id) {
            Some(Node::Shared(v)) => Some(v),
            _ => None,
        }
    }

    /// Inline form of `value` when it names a shared node
    pub fn resolve_shared(&self, value: &WireValue) -> Option<WireValue> {
        value
            .as_node()
            .and_then(|id| self.shared(id))
            .map(SharedValue::to_wire)
    }

    /// Traits of an object node
    pub fn object_traits(&self, object: &WireObject) -> Result<&Traits, AmfError> {
        self.traits
            .get(object.traits)
            .ok_or(AmfError::DanglingNode(object.traits.0))
    }

    /// Look up a member by name, sealed members first
    pub fn member(&self, id: NodeId, name: &str) -> Option<&WireValue> {
        let object = self.object(id)?;
        let traits = self.traits.get(object.traits)?;
        if let Some(index) = traits.member_index(name) {
            return object.members.get(index);
        }
        object
            .dynamic_members
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a sealed typed object; member names come from the pairs
    pub fn add_typed_object(
        &mut self,
        type_name: &str,
        members: Vec<(String, WireValue)>,
    ) -> Result<WireValue, AmfError> {
        let (names, values): (Vec<String>, Vec<WireValue>) = members.into_iter().unzip();
        let traits = self.traits.get_or_create(type_name, names, false, false)?;
        let id = self.push(Node::Object(WireObject {
            traits,
            members: values,
            dynamic_members: Vec::new(),
        }));
        Ok(WireValue::Node(id))
    }

    /// Add an anonymous dynamic object
    pub fn add_dynamic_object(&mut self, members: Vec<(String, WireValue)>) -> WireValue {
        let traits = self.traits.insert(Traits::anonymous_dynamic());
        let id = self.push(Node::Object(WireObject {
            traits,
            members: Vec::new(),
            dynamic_members: members,
        }));
        WireValue::Node(id)
    }

    pub fn add_array(&mut self, array: WireArray) -> WireValue {
        WireValue::Node(self.push(Node::Array(array)))
    }

    pub fn add_dictionary(&mut self, dictionary: WireDictionary) -> WireValue {
        WireValue::Node(self.push(Node::Dictionary(dictionary)))
    }

    pub fn add_vector(&mut self, vector: WireVector) -> WireValue {
        WireValue::Node(self.push(Node::Vector(vector)))
    }

    pub fn add_shared(&mut self, value: SharedValue) -> WireValue {
        WireValue::Node(self.push(Node::Shared(value)))
    }
}

/// One decoded (or to-be-encoded) value together with the graph it lives in
///
/// Equality is structural: it follows node links across both graphs,
/// treats a cycle as equal once the pair has been entered, compares
/// doubles bit-for-bit and treats an integer as equal to a double with
/// the same numeric value. A shared node equals its inline scalar.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub graph: ObjectGraph,
    pub root: WireValue,
}

impl Payload {
    pub fn new(graph: ObjectGraph, root: WireValue) -> Self {
        Self { graph, root }
    }

    /// Payload holding a single scalar
    pub fn scalar(root: WireValue) -> Self {
        Self {
            graph: ObjectGraph::new(),
            root,
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        GraphComparison::new(&self.graph, &other.graph).values_eq(&self.root, &other.root)
    }
}

/// Structural comparison of two graphs
pub struct GraphComparison<'a> {
    left: &'a ObjectGraph,
    right: &'a ObjectGraph,
    entered: HashSet<(NodeId, NodeId)>,
}

impl<'a> GraphComparison<'a> {
    pub fn new(left: &'a ObjectGraph, right: &'a ObjectGraph) -> Self {
        Self {
            left,
            right,
            entered: HashSet::new(),
        }
    }

    pub fn values_eq(&mut self, a: &WireValue, b: &WireValue) -> bool {
        let (left, right) = (self.left, self.right);
        if let Some(inline) = left.resolve_shared(a) {
            return self.values_eq(&inline, b);
        }
        if let Some(inline) = right.resolve_shared(b) {
            return self.values_eq(a, &inline);
        }
        match (a, b) {
            (WireValue::Undefined, WireValue::Undefined) => true,
            (WireValue::Null, WireValue::Null) => true,
            (WireValue::Bool(x), WireValue::Bool(y)) => x == y,
            (WireValue::Integer(x), WireValue::Integer(y)) => x == y,
            (WireValue::Double(x), WireValue::Double(y)) => x.to_bits() == y.to_bits(),
            (WireValue::Integer(i), WireValue::Double(d))
            | (WireValue::Double(d), WireValue::Integer(i)) => *d == *i as f64,
            (WireValue::String(x), WireValue::String(y)) => x == y,
            (WireValue::Date(x), WireValue::Date(y)) => x.to_bits() == y.to_bits(),
            (WireValue::XmlDocument(x), WireValue::XmlDocument(y)) => x == y,
            (WireValue::Xml(x), WireValue::Xml(y)) => x == y,
            (WireValue::ByteArray(x), WireValue::ByteArray(y)) => x == y,
            (WireValue::Node(x), WireValue::Node(y)) => self.nodes_eq(*x, *y),
            _ => false,
        }
    }

    fn nodes_eq(&mut self, a: NodeId, b: NodeId) -> bool {
        if !self.entered.insert((a, b)) {
            return true;
        }
        let (left, right) = (self.left, self.right);
        match (left.node(a), right.node(b)) {
            (Some(Node::Object(x)), Some(Node::Object(y))) => {
                let same_traits = match (left.traits().get(x.traits), right.traits().get(y.traits)) {
                    (Some(tx), Some(ty)) => tx == ty,
                    _ => false,
                };
                same_traits
                    && self.seq_eq(&x.members, &y.members)
                    && self.pairs_eq(&x.dynamic_members, &y.dynamic_members)
            }
            (Some(Node::Array(x)), Some(Node::Array(y))) => {
                self.pairs_eq(&x.associative, &y.associative) && self.seq_eq(&x.dense, &y.dense)
            }
            (Some(Node::Dictionary(x)), Some(Node::Dictionary(y))) => {
                x.weak_keys == y.weak_keys
                    && x.entries.len() == y.entries.len()
                    && x
                        .entries
                        .iter()
                        .zip(&y.entries)
                        .all(|((ka, va), (kb, vb))| self.values_eq(ka, kb) && self.values_eq(va, vb))
            }
            (Some(Node::Vector(x)), Some(Node::Vector(y))) => {
                x.fixed == y.fixed
                    && match (&x.items, &y.items) {
                        (VectorItems::Int(p), VectorItems::Int(q)) => p == q,
                        (VectorItems::Uint(p), VectorItems::Uint(q)) => p == q,
                        (VectorItems::Double(p), VectorItems::Double(q)) => {
                            p.len() == q.len()
                                && p.iter().zip(q).all(|(m, n)| m.to_bits() == n.to_bits())
                        }
                        (
                            VectorItems::Object { type_name: tp, items: p },
                            VectorItems::Object { type_name: tq, items: q },
                        ) => tp == tq && self.seq_eq(p, q),
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    fn seq_eq(&mut self, a: &[WireValue], b: &[WireValue]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.values_eq(x, y))
    }

    fn pairs_eq(&mut self, a: &[(String, WireValue)], b: &[(String, WireValue)]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b)
                .all(|((ka, va), (kb, vb))| ka == kb && self.values_eq(va, vb))
    }
}
