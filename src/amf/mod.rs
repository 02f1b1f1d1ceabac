//! AMF (Action Message Format) implementation
//!
//! AMF is Adobe's binary serialization format used by Flash remoting.
//! This module implements AMF3 (the ActionScript 3.0 object-graph format)
//! and AMF0, which frames remoting envelopes and embeds AMF3 values after
//! the avmplus-object marker (0x11).
//!
//! Decoded values live in an [`ObjectGraph`]: composites are arena nodes
//! addressed by [`NodeId`], so shared and cyclic references survive a
//! decode/encode round trip without reference counting.

pub mod amf0;
pub mod amf3;
pub mod config;
pub mod external;
pub mod reference;
pub mod traits;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use amf3::{Amf3Decoder, Amf3Encoder};
pub use config::{CodecContext, SerializationConfig};
pub use external::{Externalizer, ExternalizerRegistry, ProxyExternalizer};
pub use reference::{EqualityTable, Interned, ReferenceTable, StrictTable};
pub use traits::{Traits, TraitsHandle, TraitsRegistry};
pub use value::{
    Node, NodeId, ObjectGraph, Payload, SharedValue, VectorItems, WireArray, WireDictionary, WireObject,
    WireValue, WireVector,
};
