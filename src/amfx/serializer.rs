//! AMFX message documents

use crate::amf::CodecContext;
use crate::error::Result;
use crate::protocol::ActionMessage;

use super::escape::escape_attribute;
use super::writer::AmfxWriter;

/// Declaration that opens every document
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n";

/// AMFX always mirrors AMF3
pub const AMFX_VERSION: u16 = 3;

/// Renders an ActionMessage as an AMFX document
pub struct AmfxSerializer {
    context: CodecContext,
}

impl AmfxSerializer {
    pub fn new() -> Self {
        Self::with_context(CodecContext::default())
    }

    pub fn with_context(context: CodecContext) -> Self {
        Self { context }
    }

    pub fn write_message(&self, message: &ActionMessage) -> Result<String> {
        let mut writer = AmfxWriter::with_context(self.context.clone());

        tracing::debug!(
            headers = message.headers.len(),
            bodies = message.bodies.len(),
            "Rendering AMFX message"
        );

        writer.push_raw(XML_DECLARATION);
        writer.push_raw(&format!("<amfx ver=\"{}\">", AMFX_VERSION));

        for header in &message.headers {
            writer.push_raw(&format!(
                "<header name=\"{}\" mustUnderstand=\"{}\">",
                escape_attribute(&header.name),
                header.must_understand
            ));
            writer.reset();
            writer.write_value(&header.data.graph, &header.data.root)?;
            writer.push_raw("</header>");
        }

        for body in &message.bodies {
            writer.push_raw(&format!(
                "<body targetURI=\"{}\" responseURI=\"{}\">",
                escape_attribute(&body.target_uri),
                escape_attribute(&body.response_uri)
            ));
            writer.reset();
            writer.write_value(&body.data.graph, &body.data.root)?;
            writer.push_raw("</body>");
        }

        writer.push_raw("</amfx>");
        Ok(writer.finish())
    }
}

impl Default for AmfxSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::{Payload, WireValue};
    use crate::protocol::{MessageBody, MessageHeader};

    #[test]
    fn test_document_layout() {
        let mut message = ActionMessage::new(3);
        message.add_header(MessageHeader::new(
            "DSId",
            true,
            Payload::scalar("a&b".into()),
        ));
        message.add_body(MessageBody::new(
            "/1/onResult",
            "null",
            Payload::scalar(WireValue::Integer(42)),
        ));

        let xml = AmfxSerializer::new().write_message(&message).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n\
             <amfx ver=\"3\">\
             <header name=\"DSId\" mustUnderstand=\"true\"><string>a&amp;b</string></header>\
             <body targetURI=\"/1/onResult\" responseURI=\"null\"><int>42</int></body>\
             </amfx>"
        );
    }

    #[test]
    fn test_tables_reset_per_body() {
        let mut message = ActionMessage::new(3);
        for _ in 0..2 {
            message.add_body(MessageBody::new("/", "", Payload::scalar("same".into())));
        }
        let xml = AmfxSerializer::new().write_message(&message).unwrap();
        assert_eq!(xml.matches("<string>same</string>").count(), 2);
        assert!(!xml.contains("index="));
    }
}
