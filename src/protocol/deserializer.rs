//! ActionMessage decoding

use bytes::{Buf, Bytes};

use crate::amf::{Amf0Decoder, CodecContext};
use crate::error::{AmfError, Result};

use super::message::{
    ActionMessage, MessageBody, MessageHeader, AMF0_VERSION, AMF1_VERSION, AMF3_VERSION,
};

/// Reads complete ActionMessages from a byte buffer
pub struct MessageDeserializer {
    decoder: Amf0Decoder,
    origin: usize,
}

impl MessageDeserializer {
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    pub fn with_context(context: CodecContext) -> Self {
        Self {
            decoder: Amf0Decoder::with_context(context),
            origin: 0,
        }
    }

    /// Decode one envelope, consuming it from `buf`
    pub fn read_message(&mut self, buf: &mut Bytes) -> Result<ActionMessage> {
        self.origin = buf.remaining();

        let mut version = self.read_u16(buf)?;
        if version == AMF1_VERSION {
            version = AMF0_VERSION;
        }
        if version != AMF0_VERSION && version != AMF3_VERSION {
            return Err(AmfError::UnsupportedVersion(version).into());
        }

        let mut message = ActionMessage::new(version);

        let header_count = self.read_u16(buf)?;
        tracing::debug!(version, headers = header_count, "Decoding action message");
        for index in 0..header_count {
            let header = self.read_header(buf)?;
            tracing::debug!(index, name = %header.name, must_understand = header.must_understand, "Decoded header");
            message.add_header(header);
        }

        let body_count = self.read_u16(buf)?;
        for index in 0..body_count {
            let body = self.read_body(buf)?;
            tracing::debug!(index, target = %body.target_uri, response = %body.response_uri, "Decoded body");
            message.add_body(body);
        }

        Ok(message)
    }

    fn read_header(&mut self, buf: &mut Bytes) -> Result<MessageHeader> {
        let name = self.read_utf(buf)?;
        let must_understand = self.read_u8(buf)? != 0;
        let _length = self.read_i32(buf)?;

        self.decoder.reset();
        let data = self.decoder.decode_payload(buf)?;
        Ok(MessageHeader::new(name, must_understand, data))
    }

    fn read_body(&mut self, buf: &mut Bytes) -> Result<MessageBody> {
        let target_uri = self.read_utf(buf)?;
        let response_uri = self.read_utf(buf)?;
        let _length = self.read_i32(buf)?;

        self.decoder.reset();
        let data = self.decoder.decode_payload(buf)?;
        Ok(MessageBody::new(target_uri, response_uri, data))
    }

    fn need(&self, buf: &Bytes, len: usize) -> Result<()> {
        if buf.remaining() < len {
            return Err(AmfError::UnexpectedEof {
                offset: self.origin.saturating_sub(buf.remaining()),
            }
            .into());
        }
        Ok(())
    }

    fn read_u8(&self, buf: &mut Bytes) -> Result<u8> {
        self.need(buf, 1)?;
        Ok(buf.get_u8())
    }

    fn read_u16(&self, buf: &mut Bytes) -> Result<u16> {
        self.need(buf, 2)?;
        Ok(buf.get_u16())
    }

    fn read_i32(&self, buf: &mut Bytes) -> Result<i32> {
        self.need(buf, 4)?;
        Ok(buf.get_i32())
    }

    fn read_utf(&self, buf: &mut Bytes) -> Result<String> {
        let len = self.read_u16(buf)? as usize;
        let offset = self.origin.saturating_sub(buf.remaining());
        self.need(buf, len)?;
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8 { offset }.into())
    }
}

impl Default for MessageDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::WireValue;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn test_minimal_message() {
        let mut buf = Bytes::from_static(&[0x00, 0x03, 0x00, 0x00, 0x00, 0x00]);
        let message = MessageDeserializer::new().read_message(&mut buf).unwrap();
        assert_eq!(message.version, AMF3_VERSION);
        assert!(message.headers.is_empty());
        assert!(message.bodies.is_empty());
    }

    #[test]
    fn test_version_one_reads_as_zero() {
        let mut buf = Bytes::from_static(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
        let message = MessageDeserializer::new().read_message(&mut buf).unwrap();
        assert_eq!(message.version, AMF0_VERSION);
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = Bytes::from_static(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x00]);
        let err = MessageDeserializer::new().read_message(&mut buf).unwrap_err();
        assert_eq!(err, Error::Amf(AmfError::UnsupportedVersion(2)));
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_body_with_amf3_value() {
        let mut buf = Bytes::from_static(&[
            0x00, 0x03, // version
            0x00, 0x00, // headers
            0x00, 0x01, // bodies
            0x00, 0x01, b'/', // target
            0x00, 0x04, b'n', b'u', b'l', b'l', // response
            0xFF, 0xFF, 0xFF, 0xFF, // length
            0x11, 0x04, 0x07, // avmplus integer 7
        ]);
        let message = MessageDeserializer::new().read_message(&mut buf).unwrap();
        assert_eq!(message.bodies[0].target_uri, "/");
        assert_eq!(message.bodies[0].data.root, WireValue::Integer(7));
    }

    #[test]
    fn test_truncated_header() {
        let mut buf = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x05, b'a']);
        let err = MessageDeserializer::new().read_message(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }
}
