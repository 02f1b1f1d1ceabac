//! AMF3 encoder and decoder
//!
//! AMF3 is the ActionScript 3.0 serialization format used by Flex
//! remoting and messaging. Reference: AMF3 Specification (amf3_spec_121207.pdf)
//!
//! Type Markers:
//! ```text
//! 0x00 - Undefined
//! 0x01 - Null
//! 0x02 - False
//! 0x03 - True
//! 0x04 - Integer (U29, 29-bit signed)
//! 0x05 - Double (IEEE 754)
//! 0x06 - String (U29 header, reference or inline UTF-8)
//! 0x07 - XMLDocument
//! 0x08 - Date
//! 0x09 - Array (associative part, then dense part)
//! 0x0A - Object (traits, sealed members, dynamic tail)
//! 0x0B - XML (E4X)
//! 0x0C - ByteArray
//! 0x0D - Vector<int>
//! 0x0E - Vector<uint>
//! 0x0F - Vector<Number>
//! 0x10 - Vector<Object>
//! 0x11 - Dictionary
//! ```
//!
//! Every U29 header of a referenceable type carries a low "inline" bit:
//! 0 means the remaining bits index a reference table, 1 means a
//! definition follows.

mod decoder;
mod encoder;

pub use decoder::Amf3Decoder;
pub use encoder::Amf3Encoder;

use bytes::{Buf, BufMut, Bytes};

use crate::error::AmfError;

use super::config::CodecContext;
use super::value::{Payload, WireValue};

// AMF3 type markers
pub(crate) const MARKER_UNDEFINED: u8 = 0x00;
pub(crate) const MARKER_NULL: u8 = 0x01;
pub(crate) const MARKER_FALSE: u8 = 0x02;
pub(crate) const MARKER_TRUE: u8 = 0x03;
pub(crate) const MARKER_INTEGER: u8 = 0x04;
pub(crate) const MARKER_DOUBLE: u8 = 0x05;
pub(crate) const MARKER_STRING: u8 = 0x06;
pub(crate) const MARKER_XML_DOCUMENT: u8 = 0x07;
pub(crate) const MARKER_DATE: u8 = 0x08;
pub(crate) const MARKER_ARRAY: u8 = 0x09;
pub(crate) const MARKER_OBJECT: u8 = 0x0A;
pub(crate) const MARKER_XML: u8 = 0x0B;
pub(crate) const MARKER_BYTE_ARRAY: u8 = 0x0C;
pub(crate) const MARKER_VECTOR_INT: u8 = 0x0D;
pub(crate) const MARKER_VECTOR_UINT: u8 = 0x0E;
pub(crate) const MARKER_VECTOR_DOUBLE: u8 = 0x0F;
pub(crate) const MARKER_VECTOR_OBJECT: u8 = 0x10;
pub(crate) const MARKER_DICTIONARY: u8 = 0x11;

/// Largest value representable by a U29
pub const U29_MAX: u32 = 0x1FFF_FFFF;

/// Smallest integer written with the integer marker
pub const INT28_MIN: i32 = -(1 << 28);

/// Largest integer written with the integer marker
pub const INT28_MAX: i32 = (1 << 28) - 1;

/// Write a U29 variable-length integer
///
/// ```text
/// 0x00000000 - 0x0000007F : 0xxxxxxx
/// 0x00000080 - 0x00003FFF : 1xxxxxxx 0xxxxxxx
/// 0x00004000 - 0x001FFFFF : 1xxxxxxx 1xxxxxxx 0xxxxxxx
/// 0x00200000 - 0x1FFFFFFF : 1xxxxxxx 1xxxxxxx 1xxxxxxx xxxxxxxx
/// ```
pub fn write_u29<B: BufMut>(buf: &mut B, value: u32) -> Result<(), AmfError> {
    if value < 0x80 {
        buf.put_u8(value as u8);
    } else if value < 0x4000 {
        buf.put_u8(((value >> 7) & 0x7F) as u8 | 0x80);
        buf.put_u8((value & 0x7F) as u8);
    } else if value < 0x20_0000 {
        buf.put_u8(((value >> 14) & 0x7F) as u8 | 0x80);
        buf.put_u8(((value >> 7) & 0x7F) as u8 | 0x80);
        buf.put_u8((value & 0x7F) as u8);
    } else if value <= U29_MAX {
        buf.put_u8(((value >> 22) & 0x7F) as u8 | 0x80);
        buf.put_u8(((value >> 15) & 0x7F) as u8 | 0x80);
        buf.put_u8(((value >> 8) & 0x7F) as u8 | 0x80);
        buf.put_u8((value & 0xFF) as u8);
    } else {
        return Err(AmfError::IntegerOutOfRange(value));
    }
    Ok(())
}

/// Read a U29, returning `None` if the buffer runs out
pub fn read_u29<B: Buf>(buf: &mut B) -> Option<u32> {
    let mut value: u32 = 0;
    for _ in 0..3 {
        if !buf.has_remaining() {
            return None;
        }
        let byte = buf.get_u8();
        if byte & 0x80 == 0 {
            return Some((value << 7) | byte as u32);
        }
        value = (value << 7) | (byte & 0x7F) as u32;
    }
    if !buf.has_remaining() {
        return None;
    }
    Some((value << 8) | buf.get_u8() as u32)
}

/// Sign-extend a 29-bit value read off the wire
pub(crate) fn u29_to_i32(value: u32) -> i32 {
    ((value << 3) as i32) >> 3
}

/// Check if an integer travels with the integer marker
pub fn fits_int29(value: i64) -> bool {
    (INT28_MIN as i64..=INT28_MAX as i64).contains(&value)
}

/// Convenience function to encode a single value with fresh tables
pub fn encode(payload: &Payload) -> Result<Bytes, AmfError> {
    let mut encoder = Amf3Encoder::new();
    encoder.encode(&payload.graph, &payload.root)?;
    Ok(encoder.finish())
}

/// Convenience function to decode a single value with fresh tables
pub fn decode(data: &[u8]) -> Result<Payload, AmfError> {
    let mut decoder = Amf3Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode_payload(&mut buf)
}

/// Decode with an explicit context (limits and externalizers)
pub fn decode_with(context: CodecContext, data: &[u8]) -> Result<Payload, AmfError> {
    let mut decoder = Amf3Decoder::with_context(context);
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode_payload(&mut buf)
}

/// Scalar helper mostly used by tests and tracing
pub fn encode_scalar(value: &WireValue) -> Result<Bytes, AmfError> {
    encode(&Payload::scalar(value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn u29_bytes(value: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        write_u29(&mut buf, value).unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_u29_boundaries() {
        assert_eq!(u29_bytes(0), vec![0x00]);
        assert_eq!(u29_bytes(0x7F), vec![0x7F]);
        assert_eq!(u29_bytes(0x80), vec![0x81, 0x00]);
        assert_eq!(u29_bytes(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(u29_bytes(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(u29_bytes(0x1F_FFFF), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(u29_bytes(0x20_0000), vec![0x80, 0xC0, 0x80, 0x00]);
        assert_eq!(u29_bytes(U29_MAX), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_u29_rejects_oversized() {
        let mut buf = BytesMut::new();
        assert_eq!(
            write_u29(&mut buf, U29_MAX + 1),
            Err(AmfError::IntegerOutOfRange(U29_MAX + 1))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_u29_read_back() {
        for value in [0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000, U29_MAX] {
            let mut buf = Bytes::from(u29_bytes(value));
            assert_eq!(read_u29(&mut buf), Some(value));
            assert!(buf.is_empty());
        }
        let mut short = Bytes::from_static(&[0x81]);
        assert_eq!(read_u29(&mut short), None);
    }

    #[test]
    fn test_sign_extension() {
        assert_eq!(u29_to_i32((-1i32 as u32) & U29_MAX), -1);
        assert_eq!(u29_to_i32((INT28_MIN as u32) & U29_MAX), INT28_MIN);
        assert_eq!(u29_to_i32(INT28_MAX as u32), INT28_MAX);
        assert!(fits_int29(INT28_MAX as i64));
        assert!(!fits_int29(INT28_MAX as i64 + 1));
        assert!(!fits_int29(INT28_MIN as i64 - 1));
    }
}
