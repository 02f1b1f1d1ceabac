//! amf-codec: AMF object-graph serialization for remoting brokers
//!
//! This library provides:
//! - AMF3 and AMF0 binary codecs with reference tables for strings, traits and objects
//! - ActionMessage envelope reading and writing with AMF0/AMF3 switching
//! - AMFX, the XML rendering of AMF3, for tracing and XML clients
//! - Translation of decoded graphs into host values, gated by validators
//!
//! # Example: Round Trip
//!
//! ```
//! use amf_codec::amf::{ObjectGraph, Payload, WireValue};
//! use amf_codec::protocol::{ActionMessage, MessageBody, MessageDeserializer, MessageSerializer};
//! use amf_codec::translator::{HostValue, TargetType, TypeTranslator};
//!
//! # fn main() -> amf_codec::Result<()> {
//! let mut graph = ObjectGraph::new();
//! let order = graph.add_dynamic_object(vec![("id".to_string(), WireValue::Integer(7))]);
//!
//! let mut message = ActionMessage::default();
//! message.add_body(MessageBody::new("/1/onResult", "null", Payload::new(graph, order)));
//!
//! let mut bytes = MessageSerializer::new().write_message(&message)?;
//! let decoded = MessageDeserializer::new().read_message(&mut bytes)?;
//!
//! let value = TypeTranslator::default().translate(&decoded.bodies[0].data, &TargetType::Any)?;
//! let id = value.as_object().and_then(|order| order.get("id"));
//! assert_eq!(id, Some(HostValue::Int(7)));
//! # Ok(())
//! # }
//! ```

pub mod amf;
pub mod amfx;
pub mod error;
pub mod protocol;
pub mod translator;
pub mod validator;

// Re-export main types for convenience
pub use error::{Error, ErrorKind, Result};
pub use amf::{CodecContext, ObjectGraph, Payload, SerializationConfig, WireValue};
pub use amfx::AmfxSerializer;
pub use protocol::{ActionMessage, MessageDeserializer, MessageSerializer};
pub use translator::{HostEncoder, HostValue, TargetType, TranslatorConfig, TypeTranslator};
pub use validator::{ClassDeserializationValidator, DeserializationValidator, ValidatorConfig};
