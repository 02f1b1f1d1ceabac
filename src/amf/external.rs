//! Externalizable type hooks
//!
//! An externalizable AMF3 object carries no member list; its body is
//! whatever the type's own read/write routine produced. The generic codec
//! cannot skip over such a body, so every externalizable alias that may
//! appear on the wire needs an [`Externalizer`] registered here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes};

use crate::error::AmfError;

use super::amf3::{Amf3Decoder, Amf3Encoder};
use super::value::{ObjectGraph, WireValue};

/// Flex collection proxy wrapping a single array
pub const ARRAY_COLLECTION_TYPE: &str = "flex.messaging.io.ArrayCollection";

/// Flex object proxy wrapping a single object
pub const OBJECT_PROXY_TYPE: &str = "flex.messaging.io.ObjectProxy";

/// Check if an alias is one of the single-value proxies
pub fn is_proxy_type(type_name: &str) -> bool {
    type_name == ARRAY_COLLECTION_TYPE || type_name == OBJECT_PROXY_TYPE
}

/// Read/write routine for one externalizable type
pub trait Externalizer: Send + Sync {
    /// Consume the external body, returning the values it carried
    fn read_external(&self, input: &mut ExternalInput<'_>) -> Result<Vec<WireValue>, AmfError>;

    /// Write an external body from previously read (or built) values
    fn write_external(
        &self,
        values: &[WireValue],
        output: &mut ExternalOutput<'_>,
    ) -> Result<(), AmfError>;
}

/// Body of the Flex proxies: exactly one AMF3 value
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyExternalizer;

impl Externalizer for ProxyExternalizer {
    fn read_external(&self, input: &mut ExternalInput<'_>) -> Result<Vec<WireValue>, AmfError> {
        Ok(vec![input.read_value()?])
    }

    fn write_external(
        &self,
        values: &[WireValue],
        output: &mut ExternalOutput<'_>,
    ) -> Result<(), AmfError> {
        let value = values.first().cloned().unwrap_or(WireValue::Null);
        output.write_value(&value)
    }
}

/// Externalizers keyed by type alias
#[derive(Clone)]
pub struct ExternalizerRegistry {
    externalizers: HashMap<String, Arc<dyn Externalizer>>,
}

impl ExternalizerRegistry {
    /// Registry with no externalizers at all
    pub fn empty() -> Self {
        Self {
            externalizers: HashMap::new(),
        }
    }

    /// Registry with the Flex proxy types pre-registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ARRAY_COLLECTION_TYPE, ProxyExternalizer);
        registry.register(OBJECT_PROXY_TYPE, ProxyExternalizer);
        registry
    }

    /// Register (or replace) the externalizer for an alias
    pub fn register<E: Externalizer + 'static>(&mut self, type_name: impl Into<String>, externalizer: E) {
        self.externalizers
            .insert(type_name.into(), Arc::new(externalizer));
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Externalizer>> {
        self.externalizers.get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.externalizers.contains_key(type_name)
    }
}

impl Default for ExternalizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ExternalizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.externalizers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExternalizerRegistry")
            .field("types", &names)
            .finish()
    }
}

/// Cursor handed to [`Externalizer::read_external`]
pub struct ExternalInput<'a> {
    pub(crate) decoder: &'a mut Amf3Decoder,
    pub(crate) buf: &'a mut Bytes,
    pub(crate) graph: &'a mut ObjectGraph,
}

impl ExternalInput<'_> {
    /// Read a full AMF3 value, sharing the surrounding reference tables
    pub fn read_value(&mut self) -> Result<WireValue, AmfError> {
        self.decoder.read_value(self.buf, self.graph)
    }

    fn need(&self, len: usize) -> Result<(), AmfError> {
        if self.buf.remaining() < len {
            return Err(AmfError::UnexpectedEof {
                offset: self.decoder.offset(self.buf),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, AmfError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, AmfError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, AmfError> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32, AmfError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_f64(&mut self) -> Result<f64, AmfError> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    /// Read a UTF-8 string with a 16-bit length prefix
    pub fn read_utf(&mut self) -> Result<String, AmfError> {
        self.need(2)?;
        let len = self.buf.get_u16() as usize;
        let offset = self.decoder.offset(self.buf);
        self.need(len)?;
        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8 { offset })
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, AmfError> {
        self.need(len)?;
        Ok(self.buf.copy_to_bytes(len).to_vec())
    }
}

/// Sink handed to [`Externalizer::write_external`]
pub struct ExternalOutput<'a> {
    pub(crate) encoder: &'a mut Amf3Encoder,
    pub(crate) graph: &'a ObjectGraph,
}

impl ExternalOutput<'_> {
    /// Write a full AMF3 value, sharing the surrounding reference tables
    pub fn write_value(&mut self, value: &WireValue) -> Result<(), AmfError> {
        self.encoder.write_value(self.graph, value)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.encoder.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.encoder.buf.put_u8(value as u8);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.encoder.buf.put_i32(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.encoder.buf.put_u32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.encoder.buf.put_f64(value);
    }

    /// Write a UTF-8 string with a 16-bit length prefix
    pub fn write_utf(&mut self, value: &str) -> Result<(), AmfError> {
        let len = u16::try_from(value.len())
            .map_err(|_| AmfError::IntegerOutOfRange(value.len() as u32))?;
        self.encoder.buf.put_u16(len);
        self.encoder.buf.put_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.encoder.buf.put_slice(bytes);
    }
}
