//! Host value to wire graph encoding

use crate::amf::{
    Interned, Node, NodeId, ObjectGraph, Payload, ReferenceTable, StrictTable, Traits, WireArray,
    WireDictionary, WireObject, WireValue,
};
use crate::error::{Result, TranslationError};

use super::config::DEFAULT_MAX_DEPTH;
use super::host::{HostObject, HostValue};

/// Builds a [`Payload`] from host values
///
/// Composites are tracked by address so a value reachable twice (or
/// through itself) becomes one node with several references to it.
#[derive(Debug)]
pub struct HostEncoder {
    identities: StrictTable<usize>,
    nodes: Vec<NodeId>,
    max_depth: usize,
    depth: usize,
}

impl HostEncoder {
    pub fn new() -> Self {
        Self {
            identities: StrictTable::new(),
            nodes: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Set maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Encode one host value into a fresh graph
    pub fn encode(&mut self, value: &HostValue) -> Result<Payload> {
        self.identities.clear();
        self.nodes.clear();
        self.depth = 0;

        let mut graph = ObjectGraph::new();
        let root = self.encode_value(&mut graph, value)?;
        tracing::trace!(nodes = graph.len(), "Host value encoded");
        Ok(Payload::new(graph, root))
    }

    fn encode_value(&mut self, graph: &mut ObjectGraph, value: &HostValue) -> Result<WireValue> {
        let wire = match value {
            HostValue::Null => WireValue::Null,
            HostValue::Bool(b) => WireValue::Bool(*b),
            HostValue::Int(i) => WireValue::Integer(*i),
            HostValue::Long(l) => match i32::try_from(*l) {
                Ok(i) => WireValue::Integer(i),
                Err(_) => WireValue::Double(*l as f64),
            },
            HostValue::Double(d) => WireValue::Double(*d),
            HostValue::String(s) => WireValue::String(s.clone()),
            HostValue::Date(date) => WireValue::Date(date.unix_timestamp_nanos() as f64 / 1_000_000.0),
            HostValue::Xml(s) => WireValue::XmlDocument(s.clone()),
            HostValue::Bytes(bytes) => WireValue::ByteArray(bytes.clone()),
            HostValue::Enum { constant, .. } => WireValue::String(constant.clone()),
            HostValue::List(list) => {
                let Some(id) = self.enter(graph, list.addr()) else {
                    return self.existing(list.addr());
                };
                let items = list.borrow().clone();
                let dense = self.nested(graph, &items)?;
                *self.slot(graph, id)? = Node::Array(WireArray::dense(dense));
                WireValue::Node(id)
            }
            HostValue::Map(map) => {
                let Some(id) = self.enter(graph, map.addr()) else {
                    return self.existing(map.addr());
                };
                let entries = map.borrow().clone();
                let node = self.encode_map(graph, entries)?;
                *self.slot(graph, id)? = node;
                WireValue::Node(id)
            }
            HostValue::Object(object) => {
                let Some(id) = self.enter(graph, object.addr()) else {
                    return self.existing(object.addr());
                };
                let node = self.encode_object(graph, object)?;
                *self.slot(graph, id)? = node;
                WireValue::Node(id)
            }
        };
        Ok(wire)
    }

    /// Reserve a node for a composite seen for the first time
    fn enter(&mut self, graph: &mut ObjectGraph, addr: usize) -> Option<NodeId> {
        match self.identities.intern(&addr) {
            Interned::Existing(_) => None,
            Interned::New(_) => {
                let id = graph.push(Node::Array(WireArray::default()));
                self.nodes.push(id);
                Some(id)
            }
        }
    }

    fn existing(&self, addr: usize) -> Result<WireValue> {
        self.identities
            .get(&addr)
            .and_then(|handle| self.nodes.get(handle as usize))
            .map(|id| WireValue::Node(*id))
            .ok_or_else(|| TranslationError::DanglingNode(addr as u32).into())
    }

    fn slot<'g>(&self, graph: &'g mut ObjectGraph, id: NodeId) -> Result<&'g mut Node> {
        graph
            .node_mut(id)
            .ok_or_else(|| TranslationError::DanglingNode(id.index()).into())
    }

    fn nested(&mut self, graph: &mut ObjectGraph, values: &[HostValue]) -> Result<Vec<WireValue>> {
        if self.depth >= self.max_depth {
            return Err(TranslationError::NestingTooDeep { max: self.max_depth }.into());
        }
        self.depth += 1;
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            match self.encode_value(graph, value) {
                Ok(wire) => out.push(wire),
                Err(err) => {
                    self.depth -= 1;
                    return Err(err);
                }
            }
        }
        self.depth -= 1;
        Ok(out)
    }

    fn encode_map(&mut self, graph: &mut ObjectGraph, entries: Vec<(HostValue, HostValue)>) -> Result<Node> {
        let string_keyed = entries
            .iter()
            .all(|(key, _)| key.as_str().is_some_and(|k| !k.is_empty()));

        let (keys, values): (Vec<HostValue>, Vec<HostValue>) = entries.into_iter().unzip();
        let values = self.nested(graph, &values)?;

        if string_keyed {
            let members = keys
                .iter()
                .filter_map(|key| key.as_str().map(str::to_string))
                .zip(values)
                .collect();
            let traits = graph.traits_mut().insert(Traits::anonymous_dynamic());
            return Ok(Node::Object(WireObject {
                traits,
                members: Vec::new(),
                dynamic_members: members,
            }));
        }

        let keys = self.nested(graph, &keys)?;
        Ok(Node::Dictionary(WireDictionary {
            weak_keys: false,
            entries: keys.into_iter().zip(values).collect(),
        }))
    }

    fn encode_object(&mut self, graph: &mut ObjectGraph, object: &HostObject) -> Result<Node> {
        // Snapshot the instance so no borrow is held while children encode
        let (type_name, externalizable, dynamic, names, sealed, extra) = {
            let instance = object.borrow();
            let names = if instance.is_externalizable() {
                Vec::new()
            } else {
                instance.property_names()
            };
            let sealed: Vec<HostValue> = if instance.is_externalizable() {
                instance.write_external()
            } else {
                names
                    .iter()
                    .map(|name| instance.get_property(name).unwrap_or(HostValue::Null))
                    .collect()
            };
            let extra = if instance.is_dynamic() {
                instance.dynamic_properties()
            } else {
                Vec::new()
            };
            (
                instance.type_name().to_string(),
                instance.is_externalizable(),
                instance.is_dynamic(),
                names,
                sealed,
                extra,
            )
        };

        let traits = if externalizable {
            graph.traits_mut().insert(Traits::externalizable(type_name))
        } else {
            graph
                .traits_mut()
                .get_or_create(type_name, names, dynamic, false)?
        };

        let members = self.nested(graph, &sealed)?;
        let (extra_names, extra_values): (Vec<String>, Vec<HostValue>) = extra.into_iter().unzip();
        let extra_values = self.nested(graph, &extra_values)?;

        Ok(Node::Object(WireObject {
            traits,
            members,
            dynamic_members: extra_names.into_iter().zip(extra_values).collect(),
        }))
    }
}

impl Default for HostEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::amf3;
    use crate::translator::{AsObject, HostList, HostMap, TargetType, TypeTranslator};
    use time::OffsetDateTime;

    #[test]
    fn test_scalars() {
        let mut encoder = HostEncoder::new();
        assert_eq!(encoder.encode(&HostValue::Int(7)).unwrap().root, WireValue::Integer(7));
        assert_eq!(
            encoder.encode(&HostValue::Long(1 << 40)).unwrap().root,
            WireValue::Double((1u64 << 40) as f64)
        );
        assert_eq!(
            encoder
                .encode(&HostValue::Enum {
                    type_name: "com.example.Color".into(),
                    constant: "RED".into()
                })
                .unwrap()
                .root,
            WireValue::String("RED".into())
        );

        let date = OffsetDateTime::from_unix_timestamp(2).unwrap();
        assert_eq!(encoder.encode(&HostValue::Date(date)).unwrap().root, WireValue::Date(2000.0));
    }

    #[test]
    fn test_string_map_is_dynamic_object() {
        let map = HostMap::from_entries(vec![("a".into(), HostValue::Int(1))]);
        let payload = HostEncoder::new().encode(&HostValue::Map(map)).unwrap();
        let id = payload.root.as_node().unwrap();
        let object = payload.graph.object(id).unwrap();
        assert!(payload.graph.object_traits(object).unwrap().is_dynamic());
        assert_eq!(object.dynamic_members, vec![("a".to_string(), WireValue::Integer(1))]);
    }

    #[test]
    fn test_other_map_is_dictionary() {
        let map = HostMap::from_entries(vec![(HostValue::Int(1), "one".into())]);
        let payload = HostEncoder::new().encode(&HostValue::Map(map)).unwrap();
        let dictionary = payload.graph.dictionary(payload.root.as_node().unwrap()).unwrap();
        assert_eq!(dictionary.entries, vec![(WireValue::Integer(1), WireValue::String("one".into()))]);
    }

    #[test]
    fn test_typed_object() {
        let object = HostObject::new(AsObject::typed("com.example.User").with("name", "ada"));
        let payload = HostEncoder::new().encode(&HostValue::Object(object)).unwrap();
        let id = payload.root.as_node().unwrap();
        assert_eq!(payload.graph.member(id, "name"), Some(&WireValue::String("ada".into())));

        let traits = payload.graph.object_traits(payload.graph.object(id).unwrap()).unwrap();
        assert_eq!(traits.type_name(), "com.example.User");
        assert!(!traits.is_dynamic());
    }

    #[test]
    fn test_shared_list_is_one_node() {
        let shared = HostList::new(vec![HostValue::Int(1)]);
        let outer = HostList::new(vec![shared.clone().into(), shared.into()]);
        let payload = HostEncoder::new().encode(&HostValue::List(outer)).unwrap();

        let root = payload.graph.array(payload.root.as_node().unwrap()).unwrap();
        assert_eq!(root.dense[0], root.dense[1]);
        assert_eq!(payload.graph.len(), 2);
    }

    #[test]
    fn test_cycle_roundtrip() {
        let object = HostObject::new(AsObject::new());
        object
            .borrow_mut()
            .set_property("self", HostValue::Object(object.clone()))
            .unwrap();

        let payload = HostEncoder::new().encode(&HostValue::Object(object.clone())).unwrap();
        let bytes = amf3::encode(&payload).unwrap();
        let decoded = amf3::decode(&bytes).unwrap();
        assert_eq!(decoded, payload);

        let value = TypeTranslator::default().translate(&decoded, &TargetType::Any).unwrap();
        let copy = value.as_object().unwrap();
        assert!(copy.get("self").unwrap().as_object().unwrap().ptr_eq(copy));

        copy.borrow_mut().set_property("self", HostValue::Null).unwrap();
        object.borrow_mut().set_property("self", HostValue::Null).unwrap();
    }

    #[test]
    fn test_depth_limit() {
        let mut value = HostValue::List(HostList::new(Vec::new()));
        for _ in 0..4 {
            value = HostValue::List(HostList::new(vec![value]));
        }
        let err = HostEncoder::new().max_depth(2).encode(&value).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::LimitExceeded);
    }
}
