//! ActionMessage envelope types
//!
//! An AMF remoting request or response is one ActionMessage:
//!
//! ```text
//! u16 version
//! u16 header-count, then per header:
//!     utf name, u8 must-understand, i32 length, AMF0 value
//! u16 body-count, then per body:
//!     utf target-uri, utf response-uri, i32 length, AMF0 value
//! ```
//!
//! Every header and body value is an independent [`Payload`]; reference
//! tables never span two of them.

use crate::amf::Payload;

/// AMF0 envelope version (Flash Player 6-8)
pub const AMF0_VERSION: u16 = 0;

/// Legacy version number, treated as AMF0
pub const AMF1_VERSION: u16 = 1;

/// AMF3 envelope version; values switch to AMF3 via the avmplus marker
pub const AMF3_VERSION: u16 = 3;

/// Length written for headers and bodies whose size is not precomputed
pub const UNKNOWN_CONTENT_LENGTH: i32 = -1;

/// Target/response URI written for a missing value
pub const NULL_URI: &str = "null";

/// A complete remoting envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMessage {
    pub version: u16,
    pub headers: Vec<MessageHeader>,
    pub bodies: Vec<MessageBody>,
}

impl ActionMessage {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            headers: Vec::new(),
            bodies: Vec::new(),
        }
    }

    pub fn add_header(&mut self, header: MessageHeader) {
        self.headers.push(header);
    }

    pub fn add_body(&mut self, body: MessageBody) {
        self.bodies.push(body);
    }

    /// Find a header by name
    pub fn header(&self, name: &str) -> Option<&MessageHeader> {
        self.headers.iter().find(|h| h.name == name)
    }

    /// Check if values are written with AMF3 switching
    pub fn is_amf3(&self) -> bool {
        self.version >= AMF3_VERSION
    }
}

impl Default for ActionMessage {
    fn default() -> Self {
        Self::new(AMF3_VERSION)
    }
}

/// Envelope header (credentials, service-specific flags)
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub name: String,
    pub must_understand: bool,
    pub data: Payload,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, must_understand: bool, data: Payload) -> Self {
        Self {
            name: name.into(),
            must_understand,
            data,
        }
    }
}

/// Envelope body: one request or response
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBody {
    pub target_uri: String,
    pub response_uri: String,
    pub data: Payload,
}

impl MessageBody {
    pub fn new(target_uri: impl Into<String>, response_uri: impl Into<String>, data: Payload) -> Self {
        Self {
            target_uri: target_uri.into(),
            response_uri: response_uri.into(),
            data,
        }
    }
}
