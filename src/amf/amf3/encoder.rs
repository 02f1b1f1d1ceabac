//! AMF3 encoder

use bytes::{BufMut, Bytes, BytesMut};

use crate::amf::config::CodecContext;
use crate::amf::external::ExternalOutput;
use crate::amf::reference::{EqualityTable, Interned, ReferenceTable, StrictTable};
use crate::amf::traits::Traits;
use crate::amf::value::{Node, NodeId, ObjectGraph, SharedValue, VectorItems, WireObject, WireValue};
use crate::error::AmfError;

use super::*;

/// Largest length that fits a U29 header next to its inline bit
const MAX_INLINE_LENGTH: usize = (U29_MAX >> 1) as usize;

/// AMF3 encoder
///
/// Like the decoder, tables persist across [`Amf3Encoder::encode`] calls
/// until [`Amf3Encoder::reset`].
pub struct Amf3Encoder {
    pub(crate) buf: BytesMut,
    context: CodecContext,
    strings: EqualityTable<String>,
    objects: StrictTable<NodeId>,
    traits: EqualityTable<Traits>,
    depth: usize,
}

impl Amf3Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    /// Create an encoder with explicit limits and externalizers
    pub fn with_context(context: CodecContext) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            context,
            strings: EqualityTable::new(),
            objects: StrictTable::new(),
            traits: EqualityTable::new(),
            depth: 0,
        }
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

    /// Forget every reference (call between message bodies)
    pub fn reset(&mut self) {
        self.strings.clear();
        self.objects.clear();
        self.traits.clear();
        self.depth = 0;
    }

    /// Number of object-table handles allocated so far
    pub fn object_handles(&self) -> usize {
        self.objects.size()
    }

    /// Number of string-table handles allocated so far
    pub fn string_handles(&self) -> usize {
        self.strings.size()
    }

    /// Number of traits-table handles allocated so far
    pub fn traits_handles(&self) -> usize {
        self.traits.size()
    }

    /// Encode a single AMF3 value
    pub fn encode(&mut self, graph: &ObjectGraph, value: &WireValue) -> Result<(), AmfError> {
        self.write_value(graph, value)
    }

    pub(crate) fn write_value(&mut self, graph: &ObjectGraph, value: &WireValue) -> Result<(), AmfError> {
        match value {
            WireValue::Undefined => self.buf.put_u8(MARKER_UNDEFINED),
            WireValue::Null => self.buf.put_u8(MARKER_NULL),
            WireValue::Bool(b) => self.buf.put_u8(if *b { MARKER_TRUE } else { MARKER_FALSE }),
            WireValue::Integer(i) => {
                if fits_int29(*i as i64) {
                    self.buf.put_u8(MARKER_INTEGER);
                    write_u29(&mut self.buf, (*i as u32) & U29_MAX)?;
                } else {
                    self.buf.put_u8(MARKER_DOUBLE);
                    self.buf.put_f64(*i as f64);
                }
            }
            WireValue::Double(d) => {
                self.buf.put_u8(MARKER_DOUBLE);
                self.buf.put_f64(*d);
            }
            WireValue::String(s) => {
                self.buf.put_u8(MARKER_STRING);
                self.write_string(s)?;
            }
            // No identity: these take a slot but are never referenced
            WireValue::Date(millis) => {
                self.buf.put_u8(MARKER_DATE);
                self.objects.reserve();
                self.write_date(*millis)?;
            }
            WireValue::XmlDocument(s) => {
                self.buf.put_u8(MARKER_XML_DOCUMENT);
                self.objects.reserve();
                self.write_bytes(s.as_bytes())?;
            }
            WireValue::Xml(s) => {
                self.buf.put_u8(MARKER_XML);
                self.objects.reserve();
                self.write_bytes(s.as_bytes())?;
            }
            WireValue::ByteArray(bytes) => {
                self.buf.put_u8(MARKER_BYTE_ARRAY);
                self.objects.reserve();
                self.write_bytes(bytes)?;
            }
            WireValue::Node(id) => self.write_node(graph, *id)?,
        }
        Ok(())
    }

    /// Write a string without a marker; the empty string is never tabled
    pub(crate) fn write_string(&mut self, s: &str) -> Result<(), AmfError> {
        if s.is_empty() {
            return write_u29(&mut self.buf, 1);
        }
        match self.strings.intern_borrowed(s) {
            Interned::Existing(handle) => write_u29(&mut self.buf, handle << 1),
            Interned::New(_) => {
                write_u29(&mut self.buf, inline_header(s.len())?)?;
                self.buf.put_slice(s.as_bytes());
                Ok(())
            }
        }
    }

    fn write_date(&mut self, millis: f64) -> Result<(), AmfError> {
        write_u29(&mut self.buf, 1)?;
        self.buf.put_f64(millis);
        Ok(())
    }

    /// Length-prefixed body of XML or a byte array
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), AmfError> {
        write_u29(&mut self.buf, inline_header(bytes.len())?)?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    fn write_shared_body(&mut self, shared: &SharedValue) -> Result<(), AmfError> {
        match shared {
            SharedValue::Date(millis) => self.write_date(*millis),
            SharedValue::XmlDocument(s) | SharedValue::Xml(s) => self.write_bytes(s.as_bytes()),
            SharedValue::ByteArray(bytes) => self.write_bytes(bytes),
        }
    }

    fn write_node(&mut self, graph: &ObjectGraph, id: NodeId) -> Result<(), AmfError> {
        let node = graph.expect_node(id)?;
        let marker = match node {
            Node::Object(_) => MARKER_OBJECT,
            Node::Array(_) => MARKER_ARRAY,
            Node::Dictionary(_) => MARKER_DICTIONARY,
            Node::Vector(vector) => match vector.items {
                VectorItems::Int(_) => MARKER_VECTOR_INT,
                VectorItems::Uint(_) => MARKER_VECTOR_UINT,
                VectorItems::Double(_) => MARKER_VECTOR_DOUBLE,
                VectorItems::Object { .. } => MARKER_VECTOR_OBJECT,
            },
            Node::Shared(shared) => shared_marker(shared),
        };
        self.buf.put_u8(marker);

        if let Interned::Existing(handle) = self.objects.intern(&id) {
            return write_u29(&mut self.buf, handle << 1);
        }
        if let Node::Shared(shared) = node {
            return self.write_shared_body(shared);
        }

        let max = self.context.config.max_object_depth;
        if self.depth >= max {
            return Err(AmfError::NestingTooDeep { max });
        }
        self.depth += 1;
        let result = match node {
            Node::Object(object) => self.write_object(graph, object),
            Node::Array(array) => {
                self.write_length(array.dense.len())
                    .and_then(|_| self.write_pairs(graph, &array.associative))
                    .and_then(|_| self.write_values(graph, &array.dense))
            }
            Node::Dictionary(dictionary) => self.write_length(dictionary.entries.len()).and_then(|_| {
                self.buf.put_u8(dictionary.weak_keys as u8);
                for (key, value) in &dictionary.entries {
                    self.write_value(graph, key)?;
                    self.write_value(graph, value)?;
                }
                Ok(())
            }),
            Node::Vector(vector) => self.write_length(vector.items.len()).and_then(|_| {
                self.buf.put_u8(vector.fixed as u8);
                match &vector.items {
                    VectorItems::Int(items) => items.iter().for_each(|v| self.buf.put_i32(*v)),
                    VectorItems::Uint(items) => items.iter().for_each(|v| self.buf.put_u32(*v)),
                    VectorItems::Double(items) => items.iter().for_each(|v| self.buf.put_f64(*v)),
                    VectorItems::Object { type_name, items } => {
                        self.write_string(type_name)?;
                        self.write_values(graph, items)?;
                    }
                }
                Ok(())
            }),
            Node::Shared(_) => Ok(()),
        };
        self.depth -= 1;
        result
    }

    fn write_object(&mut self, graph: &ObjectGraph, object: &WireObject) -> Result<(), AmfError> {
        let traits = graph.object_traits(object)?;

        match self.traits.intern(traits) {
            Interned::Existing(handle) => write_u29(&mut self.buf, (handle << 2) | 1)?,
            Interned::New(_) => {
                let count = traits.members().len();
                if count > (U29_MAX >> 4) as usize {
                    return Err(AmfError::IntegerOutOfRange(count as u32));
                }
                let mut header = 3 | ((count as u32) << 4);
                if traits.is_externalizable() {
                    header |= 4;
                }
                if traits.is_dynamic() {
                    header |= 8;
                }
                write_u29(&mut self.buf, header)?;
                self.write_string(traits.type_name())?;
                for member in traits.members() {
                    self.write_string(member)?;
                }
            }
        }

        if traits.is_externalizable() {
            let externalizer = self
                .context
                .externalizers
                .get(traits.type_name())
                .ok_or_else(|| AmfError::UnknownExternalizable(traits.type_name().to_string()))?;
            let mut output = ExternalOutput {
                encoder: self,
                graph,
            };
            return externalizer.write_external(&object.members, &mut output);
        }

        for index in 0..traits.members().len() {
            let value = object.members.get(index).unwrap_or(&WireValue::Undefined);
            self.write_value(graph, value)?;
        }

        if traits.is_dynamic() {
            self.write_pairs(graph, &object.dynamic_members)?;
        }
        Ok(())
    }

    fn write_length(&mut self, len: usize) -> Result<(), AmfError> {
        write_u29(&mut self.buf, inline_header(len)?)
    }

    /// Name/value pairs closed by the empty string
    fn write_pairs(&mut self, graph: &ObjectGraph, pairs: &[(String, WireValue)]) -> Result<(), AmfError> {
        for (key, value) in pairs {
            if key.is_empty() {
                return Err(AmfError::EmptyKey);
            }
            self.write_string(key)?;
            self.write_value(graph, value)?;
        }
        self.write_string("")
    }

    fn write_values(&mut self, graph: &ObjectGraph, values: &[WireValue]) -> Result<(), AmfError> {
        for value in values {
            self.write_value(graph, value)?;
        }
        Ok(())
    }
}

impl Default for Amf3Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn shared_marker(shared: &SharedValue) -> u8 {
    match shared {
        SharedValue::Date(_) => MARKER_DATE,
        SharedValue::XmlDocument(_) => MARKER_XML_DOCUMENT,
        SharedValue::Xml(_) => MARKER_XML,
        SharedValue::ByteArray(_) => MARKER_BYTE_ARRAY,
    }
}

fn inline_header(len: usize) -> Result<u32, AmfError> {
    if len > MAX_INLINE_LENGTH {
        return Err(AmfError::IntegerOutOfRange(len.min(u32::MAX as usize) as u32));
    }
    Ok(((len as u32) << 1) | 1)
}
