//! AMF3 decoder

use bytes::{Buf, Bytes};

use crate::amf::config::CodecContext;
use crate::amf::external::ExternalInput;
use crate::amf::reference::ReadTable;
use crate::amf::traits::TraitsHandle;
use crate::amf::value::{
    Node, NodeId, ObjectGraph, Payload, SharedValue, VectorItems, WireArray, WireDictionary,
    WireObject, WireValue, WireVector,
};
use crate::error::{AmfError, TableKind};

use super::*;

/// Header of a referenceable value
enum ObjectHeader {
    /// Resolved reference to an earlier value
    Reference(WireValue),
    /// A definition of this length follows
    Inline(usize),
}

/// AMF3 decoder
///
/// Reference tables persist across calls to [`Amf3Decoder::decode`]
/// until [`Amf3Decoder::reset`], matching how one message body shares
/// its tables between values.
pub struct Amf3Decoder {
    context: CodecContext,
    strings: ReadTable<String>,
    objects: ReadTable<NodeId>,
    traits: ReadTable<TraitsHandle>,
    /// Current nesting depth
    depth: usize,
    /// Remaining length of the buffer at the outermost call
    origin: usize,
}

impl Amf3Decoder {
    /// Create a new decoder with default settings
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    /// Create a decoder with explicit limits and externalizers
    pub fn with_context(context: CodecContext) -> Self {
        let max = context.config.max_references;
        Self {
            context,
            strings: ReadTable::new(TableKind::String, max),
            objects: ReadTable::new(TableKind::Object, max),
            traits: ReadTable::new(TableKind::Traits, max),
            depth: 0,
            origin: 0,
        }
    }

    /// Reset decoder state (call between message bodies)
    pub fn reset(&mut self) {
        self.strings.clear();
        self.objects.clear();
        self.traits.clear();
        self.depth = 0;
    }

    /// Decode a single AMF3 value into `graph`
    pub fn decode(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        if self.depth == 0 {
            self.origin = buf.remaining();
        }
        self.read_value(buf, graph)
    }

    /// Decode a single value into a fresh graph
    pub fn decode_payload(&mut self, buf: &mut Bytes) -> Result<Payload, AmfError> {
        let mut graph = ObjectGraph::new();
        let root = self.decode(buf, &mut graph)?;
        Ok(Payload::new(graph, root))
    }

    /// Decode a value embedded in an AMF0 stream after the avmplus marker
    pub(crate) fn decode_embedded(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
        origin: usize,
        depth: usize,
    ) -> Result<WireValue, AmfError> {
        let saved = self.depth;
        self.origin = origin;
        self.depth = depth;
        let result = self.read_value(buf, graph);
        self.depth = saved;
        result
    }

    pub(crate) fn offset(&self, buf: &Bytes) -> usize {
        self.origin.saturating_sub(buf.remaining())
    }

    fn eof(&self, buf: &Bytes) -> AmfError {
        AmfError::UnexpectedEof {
            offset: self.offset(buf),
        }
    }

    fn need(&self, buf: &Bytes, len: usize) -> Result<(), AmfError> {
        if buf.remaining() < len {
            return Err(self.eof(buf));
        }
        Ok(())
    }

    pub(crate) fn read_value(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<WireValue, AmfError> {
        self.need(buf, 1)?;

        let max = self.context.config.max_object_depth;
        if self.depth >= max {
            return Err(AmfError::NestingTooDeep { max });
        }

        let offset = self.offset(buf);
        let marker = buf.get_u8();
        tracing::trace!(marker, offset, depth = self.depth, "Decoding AMF3 value");

        self.depth += 1;
        let result = self.decode_value(marker, offset, buf, graph);
        self.depth -= 1;
        result
    }

    fn decode_value(
        &mut self,
        marker: u8,
        offset: usize,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<WireValue, AmfError> {
        match marker {
            MARKER_UNDEFINED => Ok(WireValue::Undefined),
            MARKER_NULL => Ok(WireValue::Null),
            MARKER_FALSE => Ok(WireValue::Bool(false)),
            MARKER_TRUE => Ok(WireValue::Bool(true)),
            MARKER_INTEGER => {
                let value = self.read_u29(buf)?;
                Ok(WireValue::Integer(u29_to_i32(value)))
            }
            MARKER_DOUBLE => {
                self.need(buf, 8)?;
                Ok(WireValue::Double(buf.get_f64()))
            }
            MARKER_STRING => Ok(WireValue::String(self.read_string(buf)?)),
            MARKER_XML_DOCUMENT => self.decode_xml(buf, graph, SharedValue::XmlDocument),
            MARKER_DATE => self.decode_date(buf, graph),
            MARKER_ARRAY => self.decode_array(buf, graph),
            MARKER_OBJECT => self.decode_object(buf, graph),
            MARKER_XML => self.decode_xml(buf, graph, SharedValue::Xml),
            MARKER_BYTE_ARRAY => self.decode_byte_array(buf, graph),
            MARKER_VECTOR_INT | MARKER_VECTOR_UINT | MARKER_VECTOR_DOUBLE
            | MARKER_VECTOR_OBJECT => self.decode_vector(marker, buf, graph),
            MARKER_DICTIONARY => self.decode_dictionary(buf, graph),
            _ => Err(AmfError::UnknownMarker { marker, offset }),
        }
    }

    fn read_u29(&self, buf: &mut Bytes) -> Result<u32, AmfError> {
        let offset = self.offset(buf);
        read_u29(buf).ok_or(AmfError::UnexpectedEof { offset })
    }

    fn read_object_header(&self, buf: &mut Bytes) -> Result<ObjectHeader, AmfError> {
        let offset = self.offset(buf);
        let header = self.read_u29(buf)?;
        if header & 1 == 0 {
            return Ok(ObjectHeader::Reference(
                self.object_reference(header >> 1, offset)?,
            ));
        }
        Ok(ObjectHeader::Inline((header >> 1) as usize))
    }

    fn object_reference(&self, index: u32, offset: usize) -> Result<WireValue, AmfError> {
        Ok(WireValue::Node(*self.objects.get(index, offset)?))
    }

    fn read_utf8(&self, buf: &mut Bytes, len: usize) -> Result<String, AmfError> {
        let offset = self.offset(buf);
        self.need(buf, len)?;
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8 { offset })
    }

    /// Read a string without a marker; the empty string is never tabled
    pub(crate) fn read_string(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        let offset = self.offset(buf);
        let header = self.read_u29(buf)?;
        if header & 1 == 0 {
            return Ok(self.strings.get(header >> 1, offset)?.clone());
        }

        let len = (header >> 1) as usize;
        if len == 0 {
            return Ok(String::new());
        }

        let s = self.read_utf8(buf, len)?;
        let handle = self.strings.push(s.clone())?;
        tracing::trace!(handle, len, "Remembered AMF3 string");
        Ok(s)
    }

    fn decode_xml(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
        wrap: fn(String) -> SharedValue,
    ) -> Result<WireValue, AmfError> {
        let len = match self.read_object_header(buf)? {
            ObjectHeader::Inline(len) => len,
            ObjectHeader::Reference(value) => return Ok(value),
        };
        let value = wrap(self.read_utf8(buf, len)?);
        self.define_shared(graph, value)
    }

    fn decode_date(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        if let ObjectHeader::Reference(value) = self.read_object_header(buf)? {
            return Ok(value);
        }
        self.need(buf, 8)?;
        let millis = buf.get_f64();
        self.define_shared(graph, SharedValue::Date(millis))
    }

    fn decode_byte_array(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        let len = match self.read_object_header(buf)? {
            ObjectHeader::Inline(len) => len,
            ObjectHeader::Reference(value) => return Ok(value),
        };
        self.need(buf, len)?;
        let bytes = buf.copy_to_bytes(len).to_vec();
        self.define_shared(graph, SharedValue::ByteArray(bytes))
    }

    fn define_shared(&mut self, graph: &mut ObjectGraph, value: SharedValue) -> Result<WireValue, AmfError> {
        let id = self.reserve_node(graph, Node::Shared(value))?;
        Ok(WireValue::Node(id))
    }

    /// Add a node and take its object-table slot before any child is read
    fn reserve_node(&mut self, graph: &mut ObjectGraph, node: Node) -> Result<NodeId, AmfError> {
        let id = graph.push(node);
        let handle = self.objects.push(id)?;
        tracing::trace!(handle, node = id.index(), "Remembered AMF3 object");
        Ok(id)
    }

    fn decode_array(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        let len = match self.read_object_header(buf)? {
            ObjectHeader::Inline(len) => len,
            ObjectHeader::Reference(value) => return Ok(value),
        };
        let id = self.reserve_node(graph, Node::Array(WireArray::default()))?;

        let mut associative = Vec::new();
        loop {
            let key = self.read_string(buf)?;
            if key.is_empty() {
                break;
            }
            let value = self.read_value(buf, graph)?;
            associative.push((key, value));
        }

        let mut dense = Vec::with_capacity(self.context.config.capacity_for(len));
        for _ in 0..len {
            dense.push(self.read_value(buf, graph)?);
        }

        if let Some(array) = graph.array_mut(id) {
            array.associative = associative;
            array.dense = dense;
        }
        Ok(WireValue::Node(id))
    }

    fn decode_object(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        let offset = self.offset(buf);
        let header = self.read_u29(buf)?;
        if header & 1 == 0 {
            return self.object_reference(header >> 1, offset);
        }

        let traits_handle = if header & 3 == 1 {
            *self.traits.get(header >> 2, offset)?
        } else {
            let externalizable = header & 4 == 4;
            let dynamic = header & 8 == 8;
            let count = (header >> 4) as usize;

            let type_name = self.read_string(buf)?;
            let mut members = Vec::with_capacity(self.context.config.capacity_for(count));
            for _ in 0..count {
                members.push(self.read_string(buf)?);
            }

            let handle = graph
                .traits_mut()
                .get_or_create(type_name, members, dynamic, externalizable)?;
            self.traits.push(handle)?;
            handle
        };

        let traits = graph
            .traits()
            .get(traits_handle)
            .cloned()
            .ok_or(AmfError::InvalidReference {
                table: TableKind::Traits,
                index: traits_handle.index(),
                offset,
            })?;
        let id = self.reserve_node(graph, Node::Object(WireObject::new(traits_handle)))?;

        let (members, dynamic_members) = if traits.is_externalizable() {
            let externalizer = self
                .context
                .externalizers
                .get(traits.type_name())
                .ok_or_else(|| AmfError::UnknownExternalizable(traits.type_name().to_string()))?;
            let mut input = ExternalInput {
                decoder: self,
                buf,
                graph,
            };
            (externalizer.read_external(&mut input)?, Vec::new())
        } else {
            let mut members = Vec::with_capacity(traits.members().len());
            for _ in traits.members() {
                members.push(self.read_value(buf, graph)?);
            }

            let mut dynamic_members = Vec::new();
            if traits.is_dynamic() {
                loop {
                    let name = self.read_string(buf)?;
                    if name.is_empty() {
                        break;
                    }
                    let value = self.read_value(buf, graph)?;
                    dynamic_members.push((name, value));
                }
            }
            (members, dynamic_members)
        };

        if let Some(object) = graph.object_mut(id) {
            object.members = members;
            object.dynamic_members = dynamic_members;
        }
        Ok(WireValue::Node(id))
    }

    fn decode_dictionary(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<WireValue, AmfError> {
        let len = match self.read_object_header(buf)? {
            ObjectHeader::Inline(len) => len,
            ObjectHeader::Reference(value) => return Ok(value),
        };
        self.need(buf, 1)?;
        let weak_keys = buf.get_u8() != 0;
        let id = self.reserve_node(graph, Node::Dictionary(WireDictionary::default()))?;

        let mut entries = Vec::with_capacity(self.context.config.capacity_for(len));
        for _ in 0..len {
            let key = self.read_value(buf, graph)?;
            let value = self.read_value(buf, graph)?;
            entries.push((key, value));
        }

        if let Some(Node::Dictionary(dictionary)) = graph.node_mut(id) {
            dictionary.weak_keys = weak_keys;
            dictionary.entries = entries;
        }
        Ok(WireValue::Node(id))
    }

    fn decode_vector(
        &mut self,
        marker: u8,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<WireValue, AmfError> {
        let len = match self.read_object_header(buf)? {
            ObjectHeader::Inline(len) => len,
            ObjectHeader::Reference(value) => return Ok(value),
        };
        self.need(buf, 1)?;
        let fixed = buf.get_u8() != 0;

        let placeholder = WireVector {
            fixed,
            items: VectorItems::Int(Vec::new()),
        };
        let id = self.reserve_node(graph, Node::Vector(placeholder))?;

        let items = match marker {
            MARKER_VECTOR_INT => {
                self.need(buf, len.saturating_mul(4))?;
                VectorItems::Int((0..len).map(|_| buf.get_i32()).collect())
            }
            MARKER_VECTOR_UINT => {
                self.need(buf, len.saturating_mul(4))?;
                VectorItems::Uint((0..len).map(|_| buf.get_u32()).collect())
            }
            MARKER_VECTOR_DOUBLE => {
                self.need(buf, len.saturating_mul(8))?;
                VectorItems::Double((0..len).map(|_| buf.get_f64()).collect())
            }
            _ => {
                let type_name = self.read_string(buf)?;
                let mut items = Vec::with_capacity(self.context.config.capacity_for(len));
                for _ in 0..len {
                    items.push(self.read_value(buf, graph)?);
                }
                VectorItems::Object { type_name, items }
            }
        };

        if let Some(Node::Vector(vector)) = graph.node_mut(id) {
            vector.items = items;
        }
        Ok(WireValue::Node(id))
    }
}

impl Default for Amf3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::config::SerializationConfig;
    use crate::error::ErrorKind;

    fn decode_bytes(data: &[u8]) -> Result<Payload, AmfError> {
        super::super::decode(data)
    }

    #[test]
    fn test_scalars() {
        assert_eq!(decode_bytes(&[0x00]).unwrap().root, WireValue::Undefined);
        assert_eq!(decode_bytes(&[0x01]).unwrap().root, WireValue::Null);
        assert_eq!(decode_bytes(&[0x02]).unwrap().root, WireValue::Bool(false));
        assert_eq!(decode_bytes(&[0x03]).unwrap().root, WireValue::Bool(true));
        assert_eq!(
            decode_bytes(&[0x04, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap().root,
            WireValue::Integer(-1)
        );
    }

    #[test]
    fn test_string_reference() {
        // ["ab", ref 0]
        let data = [0x09, 0x05, 0x01, 0x06, 0x05, b'a', b'b', 0x06, 0x00];
        let payload = decode_bytes(&data).unwrap();
        let id = payload.root.as_node().unwrap();
        let array = payload.graph.array(id).unwrap();
        assert_eq!(array.dense, vec![WireValue::from("ab"), WireValue::from("ab")]);
    }

    #[test]
    fn test_self_referencing_array() {
        // [ref 0]: the array's own handle is reserved before its children
        let data = [0x09, 0x03, 0x01, 0x09, 0x00];
        let payload = decode_bytes(&data).unwrap();
        let id = payload.root.as_node().unwrap();
        assert_eq!(payload.graph.array(id).unwrap().dense, vec![WireValue::Node(id)]);
    }

    #[test]
    fn test_byte_array_reference_keeps_identity() {
        // [bytes 01 02, ref 1]
        let data = [0x09, 0x05, 0x01, 0x0C, 0x05, 0x01, 0x02, 0x0C, 0x02];
        let payload = decode_bytes(&data).unwrap();
        let array = payload.graph.array(payload.root.as_node().unwrap()).unwrap();
        assert_eq!(array.dense[0], array.dense[1]);

        let id = array.dense[0].as_node().unwrap();
        assert_eq!(payload.graph.shared(id), Some(&SharedValue::ByteArray(vec![1, 2])));
    }

    #[test]
    fn test_date_takes_an_object_slot() {
        // [date 0.0, ref 1, []] then a reference to the inner array at handle 2
        let mut data = vec![0x09, 0x09, 0x01, 0x08, 0x01];
        data.extend_from_slice(&0.0f64.to_be_bytes());
        data.extend_from_slice(&[0x08, 0x02, 0x09, 0x01, 0x01, 0x09, 0x04]);
        let payload = decode_bytes(&data).unwrap();
        let array = payload.graph.array(payload.root.as_node().unwrap()).unwrap();
        assert_eq!(array.dense[0], array.dense[1]);
        assert_eq!(array.dense[2], array.dense[3]);
        assert_eq!(payload.graph.resolve_shared(&array.dense[1]), Some(WireValue::Date(0.0)));
    }

    #[test]
    fn test_dynamic_object() {
        // anonymous dynamic object { a: 1 }
        let data = [0x0A, 0x0B, 0x01, 0x03, b'a', 0x04, 0x01, 0x01];
        let payload = decode_bytes(&data).unwrap();
        let id = payload.root.as_node().unwrap();
        assert_eq!(payload.graph.member(id, "a"), Some(&WireValue::Integer(1)));
        let object = payload.graph.object(id).unwrap();
        assert!(payload.graph.object_traits(object).unwrap().is_dynamic());
    }

    #[test]
    fn test_invalid_string_reference() {
        let err = decode_bytes(&[0x06, 0x04]).unwrap_err();
        assert_eq!(
            err,
            AmfError::InvalidReference {
                table: TableKind::String,
                index: 2,
                offset: 1
            }
        );
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_invalid_object_and_traits_reference() {
        let err = decode_bytes(&[0x09, 0x02]).unwrap_err();
        assert!(matches!(err, AmfError::InvalidReference { table: TableKind::Object, index: 1, .. }));

        let err = decode_bytes(&[0x0A, 0x05]).unwrap_err();
        assert!(matches!(err, AmfError::InvalidReference { table: TableKind::Traits, index: 1, .. }));
    }

    #[test]
    fn test_unknown_marker() {
        let err = decode_bytes(&[0x42]).unwrap_err();
        assert_eq!(err, AmfError::UnknownMarker { marker: 0x42, offset: 0 });
    }

    #[test]
    fn test_truncated_inputs() {
        for data in [
            &[][..],
            &[0x05, 0x00, 0x00][..],
            &[0x06, 0x07, b'a'][..],
            &[0x04, 0x81][..],
            // associative tail never terminated
            &[0x09, 0x01, 0x03, b'k', 0x01][..],
            // dynamic tail never terminated
            &[0x0A, 0x0B, 0x01][..],
        ] {
            let err = decode_bytes(data).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TruncatedInput, "input {:?}", data);
        }
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode_bytes(&[0x06, 0x05, 0xC3, 0x28]).unwrap_err();
        assert_eq!(err, AmfError::InvalidUtf8 { offset: 2 });
    }

    #[test]
    fn test_duplicate_trait_member_is_malformed() {
        // sealed typed object "T" with members [a, a]
        let data = [0x0A, 0x23, 0x03, b'T', 0x03, b'a', 0x02, 0x01, 0x01];
        let err = decode_bytes(&data).unwrap_err();
        assert!(matches!(err, AmfError::DuplicateMember { .. }));
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![0x09, 0x03, 0x01].repeat(10);
        data.push(0x01);
        let context = CodecContext::new(SerializationConfig::default().max_object_depth(4));
        let err = super::super::decode_with(context, &data).unwrap_err();
        assert_eq!(err, AmfError::NestingTooDeep { max: 4 });
        assert!(super::super::decode(&data).is_ok());
    }

    #[test]
    fn test_reference_table_limit() {
        // two distinct strings in a dense array with room for only one
        let data = [0x09, 0x05, 0x01, 0x06, 0x03, b'a', 0x06, 0x03, b'b'];
        let context = CodecContext::new(SerializationConfig::default().max_references(1));
        let err = super::super::decode_with(context, &data).unwrap_err();
        assert!(matches!(err, AmfError::TooManyReferences { .. }));
    }

    #[test]
    fn test_unregistered_externalizable() {
        // externalizable traits for "X"
        let data = [0x0A, 0x07, 0x03, b'X'];
        let err = decode_bytes(&data).unwrap_err();
        assert_eq!(err, AmfError::UnknownExternalizable("X".into()));
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn test_huge_declared_length_fails_cleanly() {
        // array declaring 2^28 - 1 dense elements with none present
        let data = [0x09, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let err = decode_bytes(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);

        let data = [0x0D, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        let err = decode_bytes(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }
}
