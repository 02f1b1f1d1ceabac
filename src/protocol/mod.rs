//! Remoting envelope
//!
//! This module handles the ActionMessage framing around AMF values:
//! - Version negotiation (AMF0 or AMF3 switching)
//! - Header and body records
//! - Per-record reference table scoping

pub mod deserializer;
pub mod message;
pub mod serializer;

pub use deserializer::MessageDeserializer;
pub use message::{ActionMessage, MessageBody, MessageHeader};
pub use serializer::MessageSerializer;
