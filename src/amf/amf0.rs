//! AMF0 encoder and decoder
//!
//! AMF0 is the original Action Message Format. Message envelopes are
//! always AMF0; their values may switch to AMF3 via the avmplus marker.
//! Reference: AMF0 File Format Specification (amf0-file-format-specification.pdf)
//!
//! Type Markers:
//! ```text
//! 0x00 - Number (IEEE 754 double)
//! 0x01 - Boolean
//! 0x02 - String (UTF-8, 16-bit length prefix)
//! 0x03 - Object (key-value pairs until 0x000009)
//! 0x04 - MovieClip (reserved, not supported)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x07 - Reference (16-bit index)
//! 0x08 - ECMA Array (associative array)
//! 0x09 - Object End (0x000009 sequence)
//! 0x0A - Strict Array (dense array)
//! 0x0B - Date (double + timezone)
//! 0x0C - Long String (UTF-8, 32-bit length prefix)
//! 0x0D - Unsupported
//! 0x0E - RecordSet (reserved, not supported)
//! 0x0F - XML Document
//! 0x10 - Typed Object (class name + properties)
//! 0x11 - AVM+ (switch to AMF3)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{AmfError, TableKind};

use super::amf3::{Amf3Decoder, Amf3Encoder};
use super::config::CodecContext;
use super::reference::{Interned, ReadTable, ReferenceTable, StrictTable};
use super::traits::Traits;
use super::value::{Node, NodeId, ObjectGraph, Payload, SharedValue, WireArray, WireObject, WireValue};

// AMF0 type markers
const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;
const MARKER_UNSUPPORTED: u8 = 0x0D;
const MARKER_XML_DOCUMENT: u8 = 0x0F;
const MARKER_TYPED_OBJECT: u8 = 0x10;
const MARKER_AVMPLUS: u8 = 0x11;

/// AMF0 decoder
///
/// Owns the AMF3 decoder used after avmplus markers; both share the
/// lifetime of one header or body and are cleared by [`Amf0Decoder::reset`].
pub struct Amf0Decoder {
    context: CodecContext,
    /// Reference table for objects and arrays
    references: ReadTable<NodeId>,
    amf3: Amf3Decoder,
    /// Current nesting depth
    depth: usize,
    origin: usize,
}

impl Amf0Decoder {
    /// Create a new decoder with default settings
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    /// Create a decoder with explicit limits and externalizers
    pub fn with_context(context: CodecContext) -> Self {
        let max = context.config.max_references.min(u16::MAX as usize + 1);
        Self {
            references: ReadTable::new(TableKind::Object, max),
            amf3: Amf3Decoder::with_context(context.clone()),
            context,
            depth: 0,
            origin: 0,
        }
    }

    /// Reset decoder state (call between headers and bodies)
    pub fn reset(&mut self) {
        self.references.clear();
        self.amf3.reset();
        self.depth = 0;
    }

    /// Decode a single AMF0 value into `graph`
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

    /// Decode all values from buffer until exhausted
    pub fn decode_all(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<Vec<WireValue>, AmfError> {
        let mut values = Vec::new();
        while buf.has_remaining() {
            values.push(self.decode(buf, graph)?);
        }
        Ok(values)
    }

    fn offset(&self, buf: &Bytes) -> usize {
        self.origin.saturating_sub(buf.remaining())
    }

    fn need(&self, buf: &Bytes, len: usize) -> Result<(), AmfError> {
        if buf.remaining() < len {
            return Err(AmfError::UnexpectedEof {
                offset: self.offset(buf),
            });
        }
        Ok(())
    }

    fn read_value(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        self.need(buf, 1)?;

        let max = self.context.config.max_object_depth;
        if self.depth >= max {
            return Err(AmfError::NestingTooDeep { max });
        }

        let offset = self.offset(buf);
        let marker = buf.get_u8();
        tracing::trace!(marker, offset, depth = self.depth, "Decoding AMF0 value");

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
            MARKER_NUMBER => {
                self.need(buf, 8)?;
                Ok(WireValue::Double(buf.get_f64()))
            }
            MARKER_BOOLEAN => {
                self.need(buf, 1)?;
                Ok(WireValue::Bool(buf.get_u8() != 0))
            }
            MARKER_STRING => Ok(WireValue::String(self.read_utf8(buf)?)),
            MARKER_OBJECT => self.decode_object(buf, graph),
            MARKER_NULL => Ok(WireValue::Null),
            MARKER_UNDEFINED | MARKER_UNSUPPORTED => Ok(WireValue::Undefined),
            MARKER_REFERENCE => {
                self.need(buf, 2)?;
                let index = buf.get_u16() as u32;
                Ok(WireValue::Node(*self.references.get(index, offset + 1)?))
            }
            MARKER_ECMA_ARRAY => self.decode_ecma_array(buf, graph),
            MARKER_STRICT_ARRAY => self.decode_strict_array(buf, graph),
            MARKER_DATE => {
                self.need(buf, 10)?;
                let millis = buf.get_f64();
                let _timezone = buf.get_i16(); // Timezone offset (deprecated, always 0)
                Ok(WireValue::Date(millis))
            }
            MARKER_LONG_STRING => Ok(WireValue::String(self.read_utf8_long(buf)?)),
            MARKER_XML_DOCUMENT => Ok(WireValue::XmlDocument(self.read_utf8_long(buf)?)),
            MARKER_TYPED_OBJECT => self.decode_typed_object(buf, graph),
            MARKER_AVMPLUS => {
                let (origin, depth) = (self.origin, self.depth);
                self.amf3.decode_embedded(buf, graph, origin, depth)
            }
            _ => Err(AmfError::UnknownMarker { marker, offset }),
        }
    }

    /// Add a node and take its reference slot before any child is read
    fn reserve_node(&mut self, graph: &mut ObjectGraph, node: Node) -> Result<NodeId, AmfError> {
        let id = graph.push(node);
        self.references.push(id)?;
        Ok(id)
    }

    /// Read key/value pairs up to the 0x000009 terminator
    fn read_properties(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<Vec<(String, WireValue)>, AmfError> {
        let mut properties = Vec::new();
        loop {
            let key = self.read_utf8(buf)?;
            if key.is_empty() {
                let offset = self.offset(buf);
                self.need(buf, 1)?;
                if buf.get_u8() != MARKER_OBJECT_END {
                    return Err(AmfError::InvalidObjectEnd { offset });
                }
                return Ok(properties);
            }
            let value = self.read_value(buf, graph)?;
            properties.push((key, value));
        }
    }

    fn decode_object(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        let traits = graph.traits_mut().insert(Traits::anonymous_dynamic());
        let id = self.reserve_node(graph, Node::Object(WireObject::new(traits)))?;

        let properties = self.read_properties(buf, graph)?;
        if let Some(object) = graph.object_mut(id) {
            object.dynamic_members = properties;
        }
        Ok(WireValue::Node(id))
    }

    fn decode_typed_object(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<WireValue, AmfError> {
        let class_name = self.read_utf8(buf)?;
        let placeholder = graph.traits_mut().insert(Traits::anonymous_dynamic());
        let id = self.reserve_node(graph, Node::Object(WireObject::new(placeholder)))?;

        let properties = self.read_properties(buf, graph)?;
        let (names, values): (Vec<String>, Vec<WireValue>) = properties.into_iter().unzip();
        let traits = graph
            .traits_mut()
            .get_or_create(class_name, names, false, false)?;

        if let Some(object) = graph.object_mut(id) {
            object.traits = traits;
            object.members = values;
        }
        Ok(WireValue::Node(id))
    }

    fn decode_ecma_array(&mut self, buf: &mut Bytes, graph: &mut ObjectGraph) -> Result<WireValue, AmfError> {
        self.need(buf, 4)?;
        // ECMA array count hint (not always accurate)
        let _count = buf.get_u32();

        let id = self.reserve_node(graph, Node::Array(WireArray::default()))?;

        // Contiguous "0", "1", ... keys come back as the dense part
        let mut array = WireArray::default();
        for (key, value) in self.read_properties(buf, graph)? {
            if array.associative.is_empty() && key.parse::<usize>().ok() == Some(array.dense.len()) {
                array.dense.push(value);
            } else {
                array.associative.push((key, value));
            }
        }

        if let Some(slot) = graph.array_mut(id) {
            *slot = array;
        }
        Ok(WireValue::Node(id))
    }

    fn decode_strict_array(
        &mut self,
        buf: &mut Bytes,
        graph: &mut ObjectGraph,
    ) -> Result<WireValue, AmfError> {
        self.need(buf, 4)?;
        let count = buf.get_u32() as usize;

        let id = self.reserve_node(graph, Node::Array(WireArray::default()))?;

        let mut elements = Vec::with_capacity(self.context.config.capacity_for(count));
        for _ in 0..count {
            elements.push(self.read_value(buf, graph)?);
        }

        if let Some(array) = graph.array_mut(id) {
            array.dense = elements;
        }
        Ok(WireValue::Node(id))
    }

    /// Read UTF-8 string with 16-bit length prefix
    pub(crate) fn read_utf8(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        self.need(buf, 2)?;
        let len = buf.get_u16() as usize;
        self.read_utf8_bytes(buf, len)
    }

    /// Read UTF-8 string with 32-bit length prefix
    fn read_utf8_long(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        self.need(buf, 4)?;
        let len = buf.get_u32() as usize;
        self.read_utf8_bytes(buf, len)
    }

    fn read_utf8_bytes(&self, buf: &mut Bytes, len: usize) -> Result<String, AmfError> {
        let offset = self.offset(buf);
        self.need(buf, len)?;
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8 { offset })
    }
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// AMF0 encoder
///
/// With avmplus enabled (AMF3 message version), every composite and
/// every AMF3-only scalar is written as `0x11` followed by AMF3, while
/// strings, numbers, booleans and dates stay AMF0.
pub struct Amf0Encoder {
    buf: BytesMut,
    references: StrictTable<NodeId>,
    amf3: Amf3Encoder,
    avmplus: bool,
    max_depth: usize,
    depth: usize,
}

impl Amf0Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    /// Create an encoder with explicit limits and externalizers
    pub fn with_context(context: CodecContext) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            references: StrictTable::new(),
            max_depth: context.config.max_object_depth,
            amf3: Amf3Encoder::with_context(context),
            avmplus: false,
            depth: 0,
        }
    }

    /// Switch composites to AMF3 via the avmplus marker
    pub fn avmplus(mut self, enabled: bool) -> Self {
        self.avmplus = enabled;
        self
    }

    /// Get the encoded bytes; tables are kept
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Get current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Forget every reference (call between headers and bodies)
    pub fn reset(&mut self) {
        self.references.clear();
        self.amf3.reset();
        self.depth = 0;
    }

    /// Encode a single AMF0 value
    pub fn encode(&mut self, graph: &ObjectGraph, value: &WireValue) -> Result<(), AmfError> {
        match value {
            WireValue::Null => self.buf.put_u8(MARKER_NULL),
            WireValue::Undefined => self.buf.put_u8(MARKER_UNDEFINED),
            WireValue::Bool(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(*b as u8);
            }
            WireValue::Double(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            WireValue::Integer(i) => {
                // AMF0 has no integer type
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*i as f64);
            }
            WireValue::String(s) => {
                if s.len() > 0xFFFF {
                    self.buf.put_u8(MARKER_LONG_STRING);
                    self.write_utf8_long(s)?;
                } else {
                    self.buf.put_u8(MARKER_STRING);
                    self.write_utf8(s)?;
                }
            }
            WireValue::Date(millis) => {
                self.buf.put_u8(MARKER_DATE);
                self.buf.put_f64(*millis);
                self.buf.put_i16(0); // Timezone (deprecated)
            }
            WireValue::XmlDocument(s) if !self.avmplus => {
                self.buf.put_u8(MARKER_XML_DOCUMENT);
                self.write_utf8_long(s)?;
            }
            WireValue::XmlDocument(_) | WireValue::Xml(_) | WireValue::ByteArray(_) => {
                self.switch_to_amf3(graph, value)?;
            }
            WireValue::Node(id) => self.encode_node(graph, *id, value)?,
        }
        Ok(())
    }

    /// Encode multiple values
    pub fn encode_all(&mut self, graph: &ObjectGraph, values: &[WireValue]) -> Result<(), AmfError> {
        for value in values {
            self.encode(graph, value)?;
        }
        Ok(())
    }

    fn switch_to_amf3(&mut self, graph: &ObjectGraph, value: &WireValue) -> Result<(), AmfError> {
        self.buf.put_u8(MARKER_AVMPLUS);
        self.amf3.encode(graph, value)?;
        let bytes = self.amf3.finish();
        self.buf.put_slice(&bytes);
        Ok(())
    }

    fn encode_node(&mut self, graph: &ObjectGraph, id: NodeId, value: &WireValue) -> Result<(), AmfError> {
        let node = graph.expect_node(id)?;
        if let Node::Shared(shared) = node {
            // AMF0 has no references for these; keep them inline where AMF0 can
            return match shared {
                SharedValue::Date(_) => self.encode(graph, &shared.to_wire()),
                SharedValue::XmlDocument(_) if !self.avmplus => self.encode(graph, &shared.to_wire()),
                _ => self.switch_to_amf3(graph, value),
            };
        }
        let amf3_only = match node {
            Node::Dictionary(_) | Node::Vector(_) => true,
            Node::Object(object) => graph.object_traits(object)?.is_externalizable(),
            Node::Array(_) | Node::Shared(_) => false,
        };
        if self.avmplus || amf3_only {
            return self.switch_to_amf3(graph, value);
        }

        if let Interned::Existing(handle) = self.references.intern(&id) {
            let index = u16::try_from(handle).map_err(|_| AmfError::TooManyReferences {
                table: TableKind::Object,
                max: u16::MAX as usize,
            })?;
            self.buf.put_u8(MARKER_REFERENCE);
            self.buf.put_u16(index);
            return Ok(());
        }

        if self.depth >= self.max_depth {
            return Err(AmfError::NestingTooDeep {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        let result = match node {
            Node::Object(object) => self.encode_object(graph, object),
            Node::Array(array) => self.encode_array(graph, array),
            Node::Dictionary(_) | Node::Vector(_) | Node::Shared(_) => Ok(()),
        };
        self.depth -= 1;
        result
    }

    fn encode_object(&mut self, graph: &ObjectGraph, object: &WireObject) -> Result<(), AmfError> {
        let traits = graph.object_traits(object)?;
        if traits.is_anonymous() {
            self.buf.put_u8(MARKER_OBJECT);
        } else {
            self.buf.put_u8(MARKER_TYPED_OBJECT);
            self.write_utf8(traits.type_name())?;
        }

        for (name, value) in traits.members().iter().zip(&object.members) {
            self.write_utf8(name)?;
            self.encode(graph, value)?;
        }
        for (name, value) in &object.dynamic_members {
            if name.is_empty() {
                return Err(AmfError::EmptyKey);
            }
            self.write_utf8(name)?;
            self.encode(graph, value)?;
        }
        self.write_object_end();
        Ok(())
    }

    fn encode_array(&mut self, graph: &ObjectGraph, array: &WireArray) -> Result<(), AmfError> {
        if !array.is_ecma() {
            self.buf.put_u8(MARKER_STRICT_ARRAY);
            self.buf.put_u32(array.dense.len() as u32);
            for element in &array.dense {
                self.encode(graph, element)?;
            }
            return Ok(());
        }

        self.buf.put_u8(MARKER_ECMA_ARRAY);
        self.buf
            .put_u32((array.dense.len() + array.associative.len()) as u32);
        for (index, element) in array.dense.iter().enumerate() {
            self.write_utf8(&index.to_string())?;
            self.encode(graph, element)?;
        }
        for (key, value) in &array.associative {
            if key.is_empty() {
                return Err(AmfError::EmptyKey);
            }
            self.write_utf8(key)?;
            self.encode(graph, value)?;
        }
        self.write_object_end();
        Ok(())
    }

    fn write_object_end(&mut self) {
        self.buf.put_u16(0); // Empty key
        self.buf.put_u8(MARKER_OBJECT_END);
    }

    /// Write UTF-8 string with 16-bit length prefix (no type marker)
    pub(crate) fn write_utf8(&mut self, s: &str) -> Result<(), AmfError> {
        let len = u16::try_from(s.len()).map_err(|_| AmfError::IntegerOutOfRange(s.len() as u32))?;
        self.buf.put_u16(len);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn write_utf8_long(&mut self, s: &str) -> Result<(), AmfError> {
        let len = u32::try_from(s.len()).map_err(|_| AmfError::IntegerOutOfRange(u32::MAX))?;
        self.buf.put_u32(len);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value
pub fn encode(payload: &Payload) -> Result<Bytes, AmfError> {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(&payload.graph, &payload.root)?;
    Ok(encoder.finish())
}

/// Convenience function to decode a single value
pub fn decode(data: &[u8]) -> Result<Payload, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode_payload(&mut buf)
}

/// Convenience function to decode all values into one graph
pub fn decode_all(data: &[u8]) -> Result<(ObjectGraph, Vec<WireValue>), AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut graph = ObjectGraph::new();
    let mut buf = Bytes::copy_from_slice(data);
    let values = decoder.decode_all(&mut buf, &mut graph)?;
    Ok((graph, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::value::WireDictionary;
    use crate::error::ErrorKind;

    fn roundtrip(payload: &Payload) -> Payload {
        let encoded = encode(payload).unwrap();
        decode(&encoded).unwrap()
    }

    #[test]
    fn test_number_roundtrip() {
        let value = Payload::scalar(WireValue::Double(42.5));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_string_roundtrip() {
        let value = Payload::scalar("hello world".into());
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_boolean_and_null_roundtrip() {
        for value in [WireValue::Bool(true), WireValue::Null, WireValue::Undefined] {
            let payload = Payload::scalar(value);
            assert_eq!(roundtrip(&payload), payload);
        }
    }

    #[test]
    fn test_object_keeps_property_order() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_dynamic_object(vec![
            ("name".into(), "test".into()),
            ("value".into(), WireValue::Double(123.0)),
        ]);
        let payload = Payload::new(graph, root);
        let decoded = roundtrip(&payload);
        assert_eq!(decoded, payload);

        let object = decoded.graph.object(decoded.root.as_node().unwrap()).unwrap();
        assert_eq!(object.dynamic_members[0].0, "name");
    }

    #[test]
    fn test_typed_object_roundtrip() {
        let mut graph = ObjectGraph::new();
        let root = graph
            .add_typed_object(
                "com.example.User",
                vec![("id".into(), WireValue::Double(1.0)), ("name".into(), "ann".into())],
            )
            .unwrap();
        let payload = Payload::new(graph, root);
        assert_eq!(roundtrip(&payload), payload);
    }

    #[test]
    fn test_array_roundtrip() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_array(WireArray::dense(vec![
            WireValue::Double(1.0),
            "two".into(),
            WireValue::Bool(true),
        ]));
        let payload = Payload::new(graph, root);
        assert_eq!(roundtrip(&payload), payload);
    }

    #[test]
    fn test_ecma_array_roundtrip() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_array(WireArray {
            associative: vec![("key".into(), "v".into())],
            dense: vec![WireValue::Double(1.0), WireValue::Double(2.0)],
        });
        let payload = Payload::new(graph, root);
        assert_eq!(roundtrip(&payload), payload);
    }

    #[test]
    fn test_multiple_values() {
        let mut encoder = Amf0Encoder::new();
        let graph = ObjectGraph::new();
        encoder
            .encode_all(
                &graph,
                &["connect".into(), WireValue::Double(1.0), WireValue::Null],
            )
            .unwrap();
        let (_, values) = decode_all(&encoder.finish()).unwrap();
        assert_eq!(
            values,
            vec!["connect".into(), WireValue::Double(1.0), WireValue::Null]
        );
    }

    #[test]
    fn test_long_string() {
        let long_str = "x".repeat(70000);
        let payload = Payload::scalar(long_str.clone().into());
        let encoded = encode(&payload).unwrap();
        assert_eq!(encoded[0], MARKER_LONG_STRING);
        assert_eq!(decode(&encoded).unwrap().root, WireValue::String(long_str));
    }

    #[test]
    fn test_cycle_uses_reference_marker() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_dynamic_object(Vec::new());
        let id = root.as_node().unwrap();
        graph
            .object_mut(id)
            .unwrap()
            .dynamic_members
            .push(("self".into(), root.clone()));
        let payload = Payload::new(graph, root);

        let encoded = encode(&payload).unwrap();
        assert_eq!(
            encoded.to_vec(),
            vec![0x03, 0x00, 0x04, b's', b'e', b'l', b'f', 0x07, 0x00, 0x00, 0x00, 0x00, 0x09]
        );
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_avmplus_switch() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_dictionary(WireDictionary {
            weak_keys: false,
            entries: vec![("a".into(), WireValue::Integer(1))],
        });
        let payload = Payload::new(graph, root);
        let encoded = encode(&payload).unwrap();
        assert_eq!(encoded[0], MARKER_AVMPLUS);
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_avmplus_mode_keeps_scalars_amf0() {
        let mut graph = ObjectGraph::new();
        let array = graph.add_array(WireArray::dense(vec![WireValue::Integer(5)]));
        let mut encoder = Amf0Encoder::new().avmplus(true);
        encoder
            .encode_all(&graph, &["op".into(), array.clone()])
            .unwrap();
        let bytes = encoder.finish();
        assert_eq!(bytes[0], MARKER_STRING);
        assert_eq!(bytes[5], MARKER_AVMPLUS);

        let (decoded_graph, values) = decode_all(&bytes).unwrap();
        let decoded = Payload::new(decoded_graph, values[1].clone());
        assert_eq!(decoded, Payload::new(graph, array));
    }

    #[test]
    fn test_shared_scalars_keep_identity_through_switch() {
        let mut graph = ObjectGraph::new();
        let bytes = graph.add_shared(SharedValue::ByteArray(vec![1, 2]));
        let date = graph.add_shared(SharedValue::Date(0.0));
        let root = graph.add_array(WireArray::dense(vec![bytes.clone(), bytes, date]));
        let payload = Payload::new(graph, root);
        let encoded = encode(&payload).unwrap();

        // strict array header, bytes through AMF3, a reference through AMF3, an AMF0 date
        assert_eq!(
            &encoded[5..14],
            &[MARKER_AVMPLUS, 0x0C, 0x05, 0x01, 0x02, MARKER_AVMPLUS, 0x0C, 0x00, MARKER_DATE]
        );

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
        let dense = &decoded.graph.array(decoded.root.as_node().unwrap()).unwrap().dense;
        assert_eq!(dense[0], dense[1]);
    }

    #[test]
    fn test_invalid_reference() {
        let err = decode(&[MARKER_REFERENCE, 0x00, 0x03]).unwrap_err();
        assert!(matches!(
            err,
            AmfError::InvalidReference { table: TableKind::Object, index: 3, offset: 1 }
        ));
    }

    #[test]
    fn test_missing_object_end_is_malformed() {
        let err = decode(&[MARKER_OBJECT, 0x00, 0x00, 0x05]).unwrap_err();
        assert_eq!(err, AmfError::InvalidObjectEnd { offset: 3 });

        let err = decode(&[MARKER_OBJECT, 0x00, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_unsupported_markers() {
        assert_eq!(decode(&[0x0D]).unwrap().root, WireValue::Undefined);
        assert!(matches!(
            decode(&[0x04]).unwrap_err(),
            AmfError::UnknownMarker { marker: 0x04, .. }
        ));
        assert!(matches!(
            decode(&[0x0E]).unwrap_err(),
            AmfError::UnknownMarker { marker: 0x0E, .. }
        ));
    }
}
