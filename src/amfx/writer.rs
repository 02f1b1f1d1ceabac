//! AMFX value writer

use crate::amf::amf3::{fits_int29, Amf3Encoder, INT28_MAX};
use crate::amf::external::ExternalOutput;
use crate::amf::reference::{EqualityTable, Interned, ReferenceTable, StrictTable};
use crate::amf::traits::Traits;
use crate::amf::value::{Node, NodeId, ObjectGraph, SharedValue, VectorItems, WireObject, WireValue};
use crate::amf::CodecContext;
use crate::error::AmfError;

use super::escape::{push_attribute, push_text};

/// Renders wire values as AMFX elements
///
/// The writer keeps the same three tables as the AMF3 encoder and fills
/// them in the same order, so `<ref index>`, `<string index>` and
/// `<traits index>` agree with the handles a binary encoding of the same
/// graph would use, up to the first externalized object.
///
/// An externalized body (an `ArrayCollection`, say) is rendered as a
/// `<bytearray>` of binary AMF3 written with fresh tables. Handles the
/// binary encoder would allocate inside that body never reach this
/// writer's tables, so indices written after such an object can differ
/// from the binary ones.
pub struct AmfxWriter {
    out: String,
    context: CodecContext,
    strings: EqualityTable<String>,
    objects: StrictTable<NodeId>,
    traits: EqualityTable<Traits>,
    depth: usize,
}

impl AmfxWriter {
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    pub fn with_context(context: CodecContext) -> Self {
        Self {
            out: String::with_capacity(256),
            context,
            strings: EqualityTable::new(),
            objects: StrictTable::new(),
            traits: EqualityTable::new(),
            depth: 0,
        }
    }

    /// Take the rendered text; tables are kept
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    /// Forget every reference (call between headers and bodies)
    pub fn reset(&mut self) {
        self.strings.clear();
        self.objects.clear();
        self.traits.clear();
        self.depth = 0;
    }

    pub fn object_handles(&self) -> usize {
        self.objects.size()
    }

    pub fn string_handles(&self) -> usize {
        self.strings.size()
    }

    pub fn traits_handles(&self) -> usize {
        self.traits.size()
    }

    /// Append raw markup
    pub(crate) fn push_raw(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Render one value
    pub fn write_value(&mut self, graph: &ObjectGraph, value: &WireValue) -> Result<(), AmfError> {
        match value {
            WireValue::Undefined => self.out.push_str("<undefined/>"),
            WireValue::Null => self.out.push_str("<null/>"),
            WireValue::Bool(true) => self.out.push_str("<true/>"),
            WireValue::Bool(false) => self.out.push_str("<false/>"),
            WireValue::Integer(i) => {
                if fits_int29(*i as i64) {
                    self.write_int(*i as i64);
                } else {
                    self.write_double(*i as f64);
                }
            }
            WireValue::Double(d) => self.write_double(*d),
            WireValue::String(s) => self.write_string(s),
            WireValue::Date(millis) => {
                self.objects.reserve();
                self.write_date(*millis);
            }
            WireValue::XmlDocument(s) => {
                self.objects.reserve();
                self.write_text_element("xmldocument", s);
            }
            WireValue::Xml(s) => {
                self.objects.reserve();
                self.write_text_element("xml", s);
            }
            WireValue::ByteArray(bytes) => {
                self.objects.reserve();
                self.write_byte_array(bytes);
            }
            WireValue::Node(id) => self.write_node(graph, *id)?,
        }
        Ok(())
    }

    fn write_int(&mut self, value: i64) {
        self.out.push_str("<int>");
        self.out.push_str(&value.to_string());
        self.out.push_str("</int>");
    }

    fn write_double(&mut self, value: f64) {
        self.out.push_str("<double>");
        self.out.push_str(&format_double(value));
        self.out.push_str("</double>");
    }

    fn write_date(&mut self, millis: f64) {
        self.out.push_str("<date>");
        self.out.push_str(&format_millis(millis));
        self.out.push_str("</date>");
    }

    fn write_shared(&mut self, shared: &SharedValue) {
        match shared {
            SharedValue::Date(millis) => self.write_date(*millis),
            SharedValue::XmlDocument(s) => self.write_text_element("xmldocument", s),
            SharedValue::Xml(s) => self.write_text_element("xml", s),
            SharedValue::ByteArray(bytes) => self.write_byte_array(bytes),
        }
    }

    fn write_text_element(&mut self, tag: &str, text: &str) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push('>');
        push_text(&mut self.out, text);
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn write_byte_array(&mut self, bytes: &[u8]) {
        self.out.push_str("<bytearray>");
        self.out.push_str(&hex::encode_upper(bytes));
        self.out.push_str("</bytearray>");
    }

    fn write_string(&mut self, s: &str) {
        if s.is_empty() {
            self.out.push_str("<string/>");
            return;
        }
        match self.strings.intern_borrowed(s) {
            Interned::Existing(handle) => {
                self.out.push_str(&format!("<string index=\"{}\"/>", handle));
            }
            Interned::New(_) => self.write_text_element("string", s),
        }
    }

    /// Strings the binary codec tables but AMFX renders as attributes
    fn intern_silently(&mut self, s: &str) {
        if !s.is_empty() {
            self.strings.intern_borrowed(s);
        }
    }

    fn open_with_attribute(&mut self, tag: &str, name: &str, value: &str) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        push_attribute(&mut self.out, value);
        self.out.push_str("\">");
    }

    fn write_node(&mut self, graph: &ObjectGraph, id: NodeId) -> Result<(), AmfError> {
        let node = graph.expect_node(id)?;

        if let Interned::Existing(handle) = self.objects.intern(&id) {
            self.out.push_str(&format!("<ref index=\"{}\"/>", handle));
            return Ok(());
        }
        if let Node::Shared(shared) = node {
            self.write_shared(shared);
            return Ok(());
        }

        let max = self.context.config.max_object_depth;
        if self.depth >= max {
            return Err(AmfError::NestingTooDeep { max });
        }
        self.depth += 1;
        let result = match node {
            Node::Object(object) => self.write_object(graph, object),
            Node::Array(array) => {
                self.out.push_str(&format!("<array length=\"{}\"", array.dense.len()));
                if array.is_ecma() {
                    self.out.push_str(" ecma=\"true\"");
                }
                self.out.push('>');
                self.write_items(graph, &array.associative)
                    .and_then(|_| self.write_values(graph, &array.dense))
                    .map(|_| self.out.push_str("</array>"))
            }
            Node::Dictionary(dictionary) => {
                self.out
                    .push_str(&format!("<dictionary length=\"{}\"", dictionary.entries.len()));
                if dictionary.weak_keys {
                    self.out.push_str(" weakKeys=\"true\"");
                }
                self.out.push('>');
                let mut result = Ok(());
                for (key, value) in &dictionary.entries {
                    result = self
                        .write_value(graph, key)
                        .and_then(|_| self.write_value(graph, value));
                    if result.is_err() {
                        break;
                    }
                }
                result.map(|_| self.out.push_str("</dictionary>"))
            }
            Node::Vector(vector) => {
                self.out.push_str(&format!(
                    "<array length=\"{}\" vector=\"{}\"",
                    vector.items.len(),
                    vector.items.kind_name()
                ));
                if vector.fixed {
                    self.out.push_str(" fixed=\"true\"");
                }
                let result = match &vector.items {
                    VectorItems::Int(items) => {
                        self.out.push('>');
                        items.iter().for_each(|v| self.write_int(*v as i64));
                        Ok(())
                    }
                    VectorItems::Uint(items) => {
                        self.out.push('>');
                        for v in items {
                            if *v <= INT28_MAX as u32 {
                                self.write_int(*v as i64);
                            } else {
                                self.write_double(*v as f64);
                            }
                        }
                        Ok(())
                    }
                    VectorItems::Double(items) => {
                        self.out.push('>');
                        items.iter().for_each(|v| self.write_double(*v));
                        Ok(())
                    }
                    VectorItems::Object { type_name, items } => {
                        if !type_name.is_empty() {
                            self.out.push_str(" type=\"");
                            push_attribute(&mut self.out, type_name);
                            self.out.push('"');
                        }
                        self.out.push('>');
                        self.intern_silently(type_name);
                        self.write_values(graph, items)
                    }
                };
                result.map(|_| self.out.push_str("</array>"))
            }
            Node::Shared(_) => Ok(()),
        };
        self.depth -= 1;
        result
    }

    fn write_object(&mut self, graph: &ObjectGraph, object: &WireObject) -> Result<(), AmfError> {
        let traits = graph.object_traits(object)?;

        if traits.is_anonymous() {
            self.out.push_str("<object>");
        } else {
            self.open_with_attribute("object", "type", traits.type_name());
        }

        match self.traits.intern(traits) {
            Interned::Existing(handle) => {
                self.out.push_str(&format!("<traits index=\"{}\"/>", handle));
            }
            Interned::New(_) => self.write_traits(traits),
        }

        if traits.is_externalizable() {
            self.write_external_body(graph, traits, object)?;
        } else {
            for index in 0..traits.members().len() {
                let value = object.members.get(index).unwrap_or(&WireValue::Undefined);
                self.write_value(graph, value)?;
            }
            if traits.is_dynamic() {
                self.write_items(graph, &object.dynamic_members)?;
            }
        }

        self.out.push_str("</object>");
        Ok(())
    }

    fn write_traits(&mut self, traits: &Traits) {
        self.intern_silently(traits.type_name());

        if traits.is_externalizable() {
            self.out.push_str("<traits externalizable=\"true\"/>");
            return;
        }

        let open = if traits.is_dynamic() {
            "<traits dynamic=\"true\""
        } else {
            "<traits"
        };
        self.out.push_str(open);
        if traits.members().is_empty() {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');
        for member in traits.members() {
            self.write_string(member);
        }
        self.out.push_str("</traits>");
    }

    fn write_external_body(
        &mut self,
        graph: &ObjectGraph,
        traits: &Traits,
        object: &WireObject,
    ) -> Result<(), AmfError> {
        let externalizer = self
            .context
            .externalizers
            .get(traits.type_name())
            .ok_or_else(|| AmfError::UnknownExternalizable(traits.type_name().to_string()))?;

        let mut encoder = Amf3Encoder::with_context(self.context.clone());
        let mut output = ExternalOutput {
            encoder: &mut encoder,
            graph,
        };
        externalizer.write_external(&object.members, &mut output)?;
        let body = encoder.finish();
        self.write_byte_array(&body);
        Ok(())
    }

    /// Named entries as `<item name="k">value</item>`
    fn write_items(&mut self, graph: &ObjectGraph, pairs: &[(String, WireValue)]) -> Result<(), AmfError> {
        for (key, value) in pairs {
            if key.is_empty() {
                return Err(AmfError::EmptyKey);
            }
            self.open_with_attribute("item", "name", key);
            self.intern_silently(key);
            self.write_value(graph, value)?;
            self.out.push_str("</item>");
        }
        Ok(())
    }

    fn write_values(&mut self, graph: &ObjectGraph, values: &[WireValue]) -> Result<(), AmfError> {
        for value in values {
            self.write_value(graph, value)?;
        }
        Ok(())
    }
}

impl Default for AmfxWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Text form of a double: NaN and the infinities by name, otherwise the
/// shortest representation that reads back to the same bits
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{:?}", value)
    }
}

fn format_millis(millis: f64) -> String {
    if millis.is_finite() && millis.fract() == 0.0 && millis.abs() < 9.0e15 {
        format!("{}", millis as i64)
    } else {
        format_double(millis)
    }
}
