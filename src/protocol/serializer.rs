//! ActionMessage encoding

use bytes::{BufMut, Bytes, BytesMut};

use crate::amf::{Amf0Encoder, CodecContext, Payload};
use crate::error::{AmfError, Result};

use super::message::{ActionMessage, MessageBody, MessageHeader, UNKNOWN_CONTENT_LENGTH};

/// Writes complete ActionMessages
pub struct MessageSerializer {
    context: CodecContext,
}

impl MessageSerializer {
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    pub fn with_context(context: CodecContext) -> Self {
        Self { context }
    }

    /// Encode one envelope
    ///
    /// Version 3 messages write composite values as AMF3 behind the
    /// avmplus marker.
    pub fn write_message(&self, message: &ActionMessage) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(256);
        let mut encoder = Amf0Encoder::with_context(self.context.clone()).avmplus(message.is_amf3());

        tracing::debug!(
            version = message.version,
            headers = message.headers.len(),
            bodies = message.bodies.len(),
            "Encoding action message"
        );

        buf.put_u16(message.version);

        buf.put_u16(count(message.headers.len())?);
        for header in &message.headers {
            write_header(&mut buf, &mut encoder, header)?;
        }

        buf.put_u16(count(message.bodies.len())?);
        for body in &message.bodies {
            write_body(&mut buf, &mut encoder, body)?;
        }

        Ok(buf.freeze())
    }
}

impl Default for MessageSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_header(buf: &mut BytesMut, encoder: &mut Amf0Encoder, header: &MessageHeader) -> Result<()> {
    write_utf(buf, &header.name)?;
    buf.put_u8(header.must_understand as u8);
    buf.put_i32(UNKNOWN_CONTENT_LENGTH);
    write_payload(buf, encoder, &header.data)
}

fn write_body(buf: &mut BytesMut, encoder: &mut Amf0Encoder, body: &MessageBody) -> Result<()> {
    write_utf(buf, &body.target_uri)?;
    write_utf(buf, &body.response_uri)?;
    buf.put_i32(UNKNOWN_CONTENT_LENGTH);
    write_payload(buf, encoder, &body.data)
}

fn write_payload(buf: &mut BytesMut, encoder: &mut Amf0Encoder, payload: &Payload) -> Result<()> {
    encoder.reset();
    encoder.encode(&payload.graph, &payload.root)?;
    buf.put_slice(&encoder.finish());
    Ok(())
}

fn write_utf(buf: &mut BytesMut, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| AmfError::IntegerOutOfRange(s.len() as u32))?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn count(len: usize) -> Result<u16> {
    Ok(u16::try_from(len).map_err(|_| AmfError::IntegerOutOfRange(len as u32))?)
}
